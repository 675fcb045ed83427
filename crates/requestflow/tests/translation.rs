use rand::{rngs::StdRng, SeedableRng};

use requestflow::executions::backoff::{next_delay_seconds, BackoffConfig};
use requestflow::executions::model::TargetType;
use requestflow::executions::status_map::{classify_raw_status, RawStatusClass};

#[test]
fn job_template_runner_vocabulary() {
    let t = TargetType::JobTemplateRunner;
    for raw in ["new", "pending", "waiting", "running"] {
        assert_eq!(classify_raw_status(t, raw), RawStatusClass::InFlight, "{raw}");
    }
    assert_eq!(classify_raw_status(t, "successful"), RawStatusClass::Succeeded);
    for raw in ["failed", "error", "canceled"] {
        assert_eq!(classify_raw_status(t, raw), RawStatusClass::Failed, "{raw}");
    }
}

#[test]
fn flow_runner_vocabulary() {
    let t = TargetType::FlowRunner;
    for raw in ["PENDING", "RUNNING", "IN_PROGRESS", "PAUSED"] {
        assert_eq!(classify_raw_status(t, raw), RawStatusClass::InFlight, "{raw}");
    }
    assert_eq!(classify_raw_status(t, "COMPLETED"), RawStatusClass::Succeeded);
    for raw in ["FAILED", "SYSTEM_FAILURE", "CANCELED", "FAILED_TO_COMPLETE"] {
        assert_eq!(classify_raw_status(t, raw), RawStatusClass::Failed, "{raw}");
    }
}

#[test]
fn case_and_whitespace_are_normalized() {
    assert_eq!(
        classify_raw_status(TargetType::JobTemplateRunner, " Successful "),
        RawStatusClass::Succeeded
    );
    assert_eq!(
        classify_raw_status(TargetType::FlowRunner, "completed"),
        RawStatusClass::Succeeded
    );
}

#[test]
fn unknown_vocabulary_stays_in_flight() {
    // Vocabulary drift must not invent a terminal outcome; the ceiling
    // times these out instead.
    assert_eq!(
        classify_raw_status(TargetType::JobTemplateRunner, "quarantined"),
        RawStatusClass::InFlight
    );
    assert_eq!(
        classify_raw_status(TargetType::FlowRunner, "WAITING_FOR_INPUT"),
        RawStatusClass::InFlight
    );
}

#[test]
fn backoff_doubles_and_caps() {
    let cfg = BackoffConfig {
        base_seconds: 30,
        max_seconds: 900,
        jitter_pct: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(7);

    assert_eq!(next_delay_seconds(1, &cfg, &mut rng), 30);
    assert_eq!(next_delay_seconds(2, &cfg, &mut rng), 60);
    assert_eq!(next_delay_seconds(3, &cfg, &mut rng), 120);
    assert_eq!(next_delay_seconds(6, &cfg, &mut rng), 900);
    // Far past the cap, including shift overflow territory.
    assert_eq!(next_delay_seconds(40, &cfg, &mut rng), 900);
    assert_eq!(next_delay_seconds(100, &cfg, &mut rng), 900);
}

#[test]
fn backoff_holds_the_cap_across_the_shift_sign_boundary() {
    // A 63-bit shift lands in the sign bit; the delay must stay at the
    // cap instead of collapsing to an immediate retry.
    let cfg = BackoffConfig {
        base_seconds: 30,
        max_seconds: 900,
        jitter_pct: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(7);

    for attempt in [62, 63, 64, 65, 66] {
        assert_eq!(
            next_delay_seconds(attempt, &cfg, &mut rng),
            900,
            "attempt {attempt} must stay at the cap"
        );
    }
}

#[test]
fn backoff_with_jitter_stays_monotonic_and_bounded() {
    let cfg = BackoffConfig {
        base_seconds: 30,
        max_seconds: 900,
        jitter_pct: 0.10,
    };
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..100 {
        let mut prev = 0;
        for attempt in 1..=10 {
            let d = next_delay_seconds(attempt, &cfg, &mut rng);
            assert!(d <= cfg.max_seconds);
            assert!(d >= prev, "delay shrank: {prev} -> {d} at attempt {attempt}");
            prev = d;
        }
        // Jitter is skipped once the doubling crosses the cap, so capped
        // delays pin there exactly and cannot shrink.
        assert_eq!(prev, 900);
    }
}

#[test]
fn canonical_status_wire_vocabulary() {
    use requestflow::executions::model::ExecutionStatus;

    assert_eq!(
        serde_json::to_value(ExecutionStatus::Pending).unwrap(),
        "Pending"
    );
    assert_eq!(
        serde_json::to_value(ExecutionStatus::Running).unwrap(),
        "Running"
    );
    assert_eq!(
        serde_json::to_value(ExecutionStatus::Succeeded).unwrap(),
        "Success"
    );
    assert_eq!(
        serde_json::to_value(ExecutionStatus::Failed).unwrap(),
        "Failed"
    );
}

use rand::Rng;

/// Launch retry curve: exponential doubling from `base_seconds`, capped at
/// `max_seconds`, with symmetric jitter below the cap. Delays never
/// shrink: jitter under ~0.33 cannot close a doubling gap, and once the
/// curve reaches the cap the delay pins to `max_seconds` exactly.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_seconds: i64,
    pub max_seconds: i64,
    pub jitter_pct: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_seconds: 30,
            max_seconds: 15 * 60,
            jitter_pct: 0.10,
        }
    }
}

pub fn next_delay_seconds(attempt_no: i32, cfg: &BackoffConfig, rng: &mut impl Rng) -> i64 {
    let attempt_no = attempt_no.max(1) as u32;
    let exp = attempt_no.saturating_sub(1);

    // 2^exp with overflow protection. A shift into the sign bit still
    // returns Some, so non-positive results are saturated too.
    let pow2 = 1_i64
        .checked_shl(exp)
        .filter(|v| *v > 0)
        .unwrap_or(i64::MAX);
    let delay = cfg.base_seconds.saturating_mul(pow2);

    // At the cap the delay is exact, with no jitter applied.
    if delay >= cfg.max_seconds {
        return cfg.max_seconds;
    }

    let jitter_range = (delay as f64) * cfg.jitter_pct;
    let jitter = if jitter_range > 0.0 {
        rng.gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };

    let jittered = (delay as f64 + jitter).round() as i64;
    jittered.clamp(0, cfg.max_seconds)
}

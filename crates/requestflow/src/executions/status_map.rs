use crate::executions::model::TargetType;

/// What one raw backend status means for the canonical lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStatusClass {
    InFlight,
    Succeeded,
    Failed,
}

/// Declarative translation from each backend's status vocabulary to the
/// canonical lifecycle. Unknown strings classify as in-flight: the sweep
/// keeps polling and the ceiling eventually times the execution out, which
/// beats guessing a terminal outcome from a vocabulary drift.
pub fn classify_raw_status(target: TargetType, raw: &str) -> RawStatusClass {
    let raw = raw.trim().to_ascii_lowercase();
    match target {
        TargetType::JobTemplateRunner => match raw.as_str() {
            "new" | "pending" | "waiting" | "running" => RawStatusClass::InFlight,
            "successful" => RawStatusClass::Succeeded,
            "failed" | "error" | "canceled" => RawStatusClass::Failed,
            _ => RawStatusClass::InFlight,
        },
        TargetType::FlowRunner => match raw.as_str() {
            "pending" | "running" | "in_progress" | "paused" => RawStatusClass::InFlight,
            "completed" => RawStatusClass::Succeeded,
            "failed" | "system_failure" | "canceled" | "failed_to_complete" => {
                RawStatusClass::Failed
            }
            _ => RawStatusClass::InFlight,
        },
    }
}

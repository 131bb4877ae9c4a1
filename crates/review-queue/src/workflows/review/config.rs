use super::sla::{SlaCalculator, SlaPolicy, DEFAULT_AT_RISK_THRESHOLD};

pub const DEFAULT_BULK_LIMIT: usize = 50;
/// Hard ceiling on rows resolved by one bulk call.
pub const MAX_BULK_LIMIT: usize = 50;
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// Queue tuning loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    pub sla: SlaPolicy,
    pub at_risk_threshold: f64,
    pub bulk_limit: usize,
    pub history_window_days: i64,
}

impl QueueSettings {
    pub fn calculator(&self) -> SlaCalculator {
        SlaCalculator::new(self.sla.clone(), self.at_risk_threshold)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            sla: SlaPolicy::standard(),
            at_risk_threshold: DEFAULT_AT_RISK_THRESHOLD,
            bulk_limit: DEFAULT_BULK_LIMIT,
            history_window_days: DEFAULT_HISTORY_WINDOW_DAYS,
        }
    }
}

/// Mode escalation: risk triggers aggregated into a NORMAL..PANIC tier
pub mod engine;
pub mod triggers;

pub use engine::{aggregate, evaluate_mode, ModeState};
pub use triggers::{evaluate_trigger, ModeInputs, TriggerName, TriggerResult, TriggerStatus};

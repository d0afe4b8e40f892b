/// Decision pipeline: one pure cycle plus the state carried between cycles
pub mod cycle;
pub mod state;

pub use cycle::{run_cycle, CycleInputs, CycleOutcome};
pub use state::CycleState;

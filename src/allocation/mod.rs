/// Allocation: policy resolution, rebalancing, exits and the current state source
pub mod exit;
pub mod planner;
pub mod policy;
pub mod source;

pub use exit::{evaluate_exit, ExitDirective};
pub use planner::{
    apply_plan, plan_rebalance, AllocationState, Direction, PlanSafety, RebalanceAction,
    RebalancePlan,
};
pub use policy::{resolve_policy, AllocationPolicy, PolicySource};
pub use source::{AllocationStateSource, JournalAllocationSource};

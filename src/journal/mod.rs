/// Shared append-only journals
///
/// Independent processes coordinate only through these JSONL files:
/// - `lock`: advisory `<file>.lock` markers with timeout and stale reclaim
/// - `reader`: tolerant tailed reads
/// - `writer`: single-line appends and the per-cycle record writer
/// - `records`: line layouts
pub mod lock;
pub mod reader;
pub mod records;
pub mod writer;

pub use lock::{acquire_lock, is_locked, release_lock, JournalLock, LockGuard, LockOptions, LockToken};
pub use reader::read_tail;
pub use records::{
    AllocationPayload, AllocationRecord, AnomalyKind, AnomalyPayload, AnomalyRecord, CycleMetrics,
    DecisionPayload, DecisionRecord, JournalRecord, PlanSummary, SignalPayload, SignalRecord,
};
pub use writer::{append, JournalWriter, WriteReport};

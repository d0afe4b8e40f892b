/// Market inputs and regime detection
///
/// - `types`: pool records, snapshots and per-asset metric samples
/// - `ingest`: pool file parsing and change derivation
/// - `detector`: favorable / neutre / defavorable classification
pub mod detector;
pub mod ingest;
pub mod types;

pub use detector::{detect, median, DetectorState, RegimeDecision};
pub use ingest::{build_observations, load_pools, IngestOutcome};
pub use types::{AssetObservation, MetricSample, PoolRecord, PoolSnapshot};

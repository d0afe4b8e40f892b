//! Anomaly watcher over the signals journal
//!
//! Runs in its own process. Each pass tails `signals.jsonl`, turns records it
//! has not seen yet into anomaly payloads and appends them to
//! `anomalies.jsonl`. Seen records are tracked by `(run_id, cycle)`.

use crate::config::ObserverConfig;
use crate::journal::{read_tail, AnomalyKind, AnomalyPayload, JournalWriter, SignalRecord};
use crate::logger::{self, LogTag};
use crate::types::RegimeLabel;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

pub struct AnomalyWatcher {
    config: ObserverConfig,
    seen: HashSet<(String, u64)>,
    last_context: Option<RegimeLabel>,
    /// Newest record timestamp already reported as stale
    stale_reported_for: Option<DateTime<Utc>>,
}

impl AnomalyWatcher {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            seen: HashSet::new(),
            last_context: None,
            stale_reported_for: None,
        }
    }

    /// Anomalies raised by `records` (file order) as of `now`
    pub fn inspect(&mut self, records: &[SignalRecord], now: DateTime<Utc>) -> Vec<AnomalyPayload> {
        let mut anomalies = Vec::new();

        for record in records {
            let key = (record.run_id.clone(), record.payload.cycle);
            if !self.seen.insert(key) {
                continue;
            }
            let signal = &record.payload;
            let anomaly = |kind, detail: String| AnomalyPayload {
                kind,
                detail,
                tier: Some(signal.mode.tier),
                source_run_id: Some(record.run_id.clone()),
                source_cycle: Some(signal.cycle),
            };

            if signal.mode.tier >= self.config.alert_tier {
                anomalies.push(anomaly(
                    AnomalyKind::TierEscalated,
                    format!("{} ({})", signal.mode.tier, signal.mode.rule_applied),
                ));
            }

            if let Some(previous) = self.last_context {
                if previous != signal.context {
                    anomalies.push(anomaly(
                        AnomalyKind::ContextFlip,
                        format!("{} -> {}", previous, signal.context),
                    ));
                }
            }
            self.last_context = Some(signal.context);

            if signal.exit.exit {
                let buckets: Vec<&str> = signal.exit.buckets_affected.iter().map(|b| b.as_str()).collect();
                anomalies.push(anomaly(
                    AnomalyKind::ExitDirective,
                    format!("{} [{}]", signal.exit.reason, buckets.join(", ")),
                ));
            }

            if !signal.fallbacks.is_empty() {
                anomalies.push(anomaly(AnomalyKind::StageFallback, signal.fallbacks.join("; ")));
            }
        }

        // Records that left the tail window never come back into it
        let window: HashSet<(&str, u64)> = records
            .iter()
            .map(|r| (r.run_id.as_str(), r.payload.cycle))
            .collect();
        self.seen
            .retain(|(run, cycle)| window.contains(&(run.as_str(), *cycle)));

        if let Some(newest) = records.iter().map(|r| r.timestamp).max() {
            let silent = now.signed_duration_since(newest);
            let limit = chrono::Duration::seconds(self.config.stale_after_secs as i64);
            if silent > limit && self.stale_reported_for != Some(newest) {
                self.stale_reported_for = Some(newest);
                anomalies.push(AnomalyPayload {
                    kind: AnomalyKind::StaleJournal,
                    detail: format!("no signal record for {}s", silent.num_seconds()),
                    tier: None,
                    source_run_id: None,
                    source_cycle: None,
                });
            }
        }

        anomalies
    }
}

/// Tail, inspect and append once; returns the number of anomalies written
pub fn observe_once(watcher: &mut AnomalyWatcher, writer: &JournalWriter, read_wait: Duration) -> usize {
    let records: Vec<SignalRecord> = read_tail(
        &writer.paths().signals,
        watcher.config.tail_lines,
        true,
        read_wait,
    );
    let anomalies = watcher.inspect(&records, Utc::now());

    let mut written = 0;
    for anomaly in anomalies {
        logger::warning(
            LogTag::Observer,
            &format!("{}: {}", anomaly.kind.as_str(), anomaly.detail),
        );
        match writer.record_anomaly(anomaly) {
            Ok(()) => written += 1,
            Err(e) => logger::error(LogTag::Observer, &format!("Anomaly write failed: {}", e)),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{evaluate_exit, AllocationPolicy};
    use crate::journal::{CycleMetrics, JournalRecord, PlanSummary, SignalPayload};
    use crate::mode::ModeState;
    use crate::types::ModeTier;

    fn record(run: &str, cycle: u64, context: RegimeLabel, tier: ModeTier) -> SignalRecord {
        let mut mode = ModeState::normal("test");
        mode.tier = tier;
        JournalRecord::new(
            run,
            SignalPayload {
                cycle,
                context,
                score: 0.0,
                sample_size: 3,
                reason: "stable".to_string(),
                metrics: CycleMetrics::default(),
                mode,
                policy: AllocationPolicy::equal_split(),
                plan: PlanSummary {
                    actions: 0,
                    moved_usd: 0.0,
                    total_usd: 10_000.0,
                    capped: false,
                    cancelled_reason: None,
                },
                exit: evaluate_exit(tier),
                scores: Vec::new(),
                fallbacks: Vec::new(),
            },
        )
    }

    fn kinds(anomalies: &[AnomalyPayload]) -> Vec<AnomalyKind> {
        anomalies.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_quiet_records_raise_nothing() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let records = vec![
            record("r", 1, RegimeLabel::Neutre, ModeTier::Normal),
            record("r", 2, RegimeLabel::Neutre, ModeTier::Tension),
        ];
        assert!(watcher.inspect(&records, Utc::now()).is_empty());
    }

    #[test]
    fn test_escalation_flip_and_exit() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let records = vec![
            record("r", 1, RegimeLabel::Neutre, ModeTier::Normal),
            record("r", 2, RegimeLabel::Defavorable, ModeTier::Crise),
        ];
        let found = kinds(&watcher.inspect(&records, Utc::now()));
        assert_eq!(
            found,
            vec![AnomalyKind::TierEscalated, AnomalyKind::ContextFlip, AnomalyKind::ExitDirective]
        );
    }

    #[test]
    fn test_records_reported_once() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let records = vec![record("r", 1, RegimeLabel::Neutre, ModeTier::Panic)];
        assert_eq!(watcher.inspect(&records, Utc::now()).len(), 2);
        assert!(watcher.inspect(&records, Utc::now()).is_empty());

        // Same cycle number from another run is a different record
        let other = vec![record("r2", 1, RegimeLabel::Neutre, ModeTier::Panic)];
        assert_eq!(watcher.inspect(&other, Utc::now()).len(), 2);
    }

    #[test]
    fn test_seen_set_follows_tail_window() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let first = vec![
            record("r", 1, RegimeLabel::Neutre, ModeTier::Panic),
            record("r", 2, RegimeLabel::Neutre, ModeTier::Normal),
        ];
        watcher.inspect(&first, Utc::now());
        assert_eq!(watcher.seen.len(), 2);

        let second = vec![
            record("r", 2, RegimeLabel::Neutre, ModeTier::Normal),
            record("r", 3, RegimeLabel::Neutre, ModeTier::Normal),
        ];
        assert!(watcher.inspect(&second, Utc::now()).is_empty());
        assert_eq!(watcher.seen.len(), 2);
        assert!(!watcher.seen.contains(&("r".to_string(), 1)));
    }

    #[test]
    fn test_stale_journal_reported_once_per_silence() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let records = vec![record("r", 1, RegimeLabel::Neutre, ModeTier::Normal)];
        let later = Utc::now() + chrono::Duration::hours(1);

        assert_eq!(kinds(&watcher.inspect(&records, later)), vec![AnomalyKind::StaleJournal]);
        assert!(watcher.inspect(&records, later).is_empty());
    }

    #[test]
    fn test_fallbacks_reported() {
        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        let mut r = record("r", 1, RegimeLabel::Inconnu, ModeTier::Normal);
        r.payload.fallbacks.push("detector: non-finite".to_string());
        assert_eq!(kinds(&watcher.inspect(&[r], Utc::now())), vec![AnomalyKind::StageFallback]);
    }

    #[test]
    fn test_observe_once_appends_anomalies() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::paths::JournalPaths::in_dir(dir.path());
        let writer = JournalWriter::new(paths.clone(), Default::default(), "observer");
        crate::journal::append(
            &paths.signals,
            &record("r", 1, RegimeLabel::Neutre, ModeTier::Panic),
            &Default::default(),
        )
        .unwrap();

        let mut watcher = AnomalyWatcher::new(ObserverConfig::default());
        assert_eq!(observe_once(&mut watcher, &writer, Duration::ZERO), 2);
        assert_eq!(observe_once(&mut watcher, &writer, Duration::ZERO), 0);

        let lines = std::fs::read_to_string(&paths.anomalies).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }
}

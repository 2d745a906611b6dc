//! Idempotent resolution dispatch
//!
//! The resolver drives exactly-once resolution per case through two guards:
//! a durable processed marker (check before, mark after) and an in-process
//! single-flight lease so overlapping invocations for the same case cannot
//! both pass the check-then-act window. The lease covers one process; the
//! cross-process overlap risk is documented in DESIGN.md.

use std::sync::Arc;

use agora_markers::ProcessedMarkerStore;
use agora_types::{DisputeCase, Result};
use dashmap::DashSet;
use tracing::{debug, info};

use crate::ScanReport;

/// External action that actually resolves a case (ledger call, queue, ...)
#[async_trait::async_trait]
pub trait ResolutionDispatcher: Send + Sync {
    async fn dispatch(&self, case: &DisputeCase) -> Result<()>;
}

/// What happened to one case during a resolver pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Resolution action dispatched and the case marked processed
    Dispatched,
    /// Marker already present; nothing dispatched
    SkippedProcessed,
    /// Another invocation for this case is in flight right now
    SkippedInFlight,
}

/// Tally of one resolver pass over a scan report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Dispatches resolution actions at most once per case
pub struct DisputeResolver {
    markers: Arc<dyn ProcessedMarkerStore>,
    dispatcher: Arc<dyn ResolutionDispatcher>,
    in_flight: DashSet<String>,
}

impl DisputeResolver {
    pub fn new(
        markers: Arc<dyn ProcessedMarkerStore>,
        dispatcher: Arc<dyn ResolutionDispatcher>,
    ) -> Self {
        Self {
            markers,
            dispatcher,
            in_flight: DashSet::new(),
        }
    }

    /// Resolve one case, idempotently. The lease is released on every path,
    /// including dispatch failure, so a failed case can be retried by the
    /// next scheduled pass.
    pub async fn resolve(&self, case: &DisputeCase) -> Result<ResolutionOutcome> {
        let key = case.case_id.as_str().to_string();
        if !self.in_flight.insert(key.clone()) {
            debug!(case = %case.case_id, "resolution already in flight, skipping");
            return Ok(ResolutionOutcome::SkippedInFlight);
        }

        let outcome = self.resolve_leased(case).await;
        self.in_flight.remove(&key);
        outcome
    }

    async fn resolve_leased(&self, case: &DisputeCase) -> Result<ResolutionOutcome> {
        if self.markers.is_processed(&case.case_id).await? {
            debug!(case = %case.case_id, "already processed, skipping dispatch");
            return Ok(ResolutionOutcome::SkippedProcessed);
        }

        self.dispatcher.dispatch(case).await?;
        self.markers.mark_processed(&case.case_id).await?;
        info!(case = %case.case_id, "resolution dispatched");
        Ok(ResolutionOutcome::Dispatched)
    }

    /// Resolve every resolvable case in a scan report. Per-case failures are
    /// tallied, not fatal; the failed cases stay unmarked for the next pass.
    pub async fn resolve_report(&self, report: &ScanReport) -> ResolutionSummary {
        let mut summary = ResolutionSummary::default();
        for entry in &report.resolvable {
            match self.resolve(&entry.case).await {
                Ok(ResolutionOutcome::Dispatched) => summary.dispatched += 1,
                Ok(_) => summary.skipped += 1,
                Err(err) => {
                    tracing::warn!(case = %entry.case.case_id, error = %err, "resolution failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaseReport;
    use agora_markers::MemoryMarkerStore;
    use agora_types::{AgoraError, CaseId, DisputeStatus, TaskId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn case(id: &str) -> DisputeCase {
        DisputeCase {
            task_id: TaskId::new(),
            case_id: CaseId::new(id),
            escalation_block: 100,
            liveness_seconds: 120,
            status: DisputeStatus::Resolvable,
        }
    }

    /// Dispatcher counting external effects, optionally slow or failing
    struct CountingDispatcher {
        dispatched: AtomicUsize,
        delay: Duration,
        fail_first: AtomicUsize,
    }

    impl CountingDispatcher {
        fn new() -> Self {
            Self {
                dispatched: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_first: AtomicUsize::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn failing_once() -> Self {
            let d = Self::new();
            d.fail_first.store(1, Ordering::SeqCst);
            d
        }

        fn count(&self) -> usize {
            self.dispatched.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ResolutionDispatcher for CountingDispatcher {
        async fn dispatch(&self, _case: &DisputeCase) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                .is_ok()
            {
                return Err(AgoraError::upstream("ledger rejected resolution"));
            }
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_then_skips_on_repeat() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let resolver = DisputeResolver::new(
            Arc::new(MemoryMarkerStore::new()),
            Arc::clone(&dispatcher) as _,
        );
        let c = case("case-1");

        assert_eq!(resolver.resolve(&c).await.unwrap(), ResolutionOutcome::Dispatched);
        assert_eq!(resolver.resolve(&c).await.unwrap(), ResolutionOutcome::SkippedProcessed);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn case_spelling_variants_dispatch_once() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let resolver = DisputeResolver::new(
            Arc::new(MemoryMarkerStore::new()),
            Arc::clone(&dispatcher) as _,
        );

        resolver.resolve(&case("CASE-7")).await.unwrap();
        let second = resolver.resolve(&case("case-7")).await.unwrap();
        assert_eq!(second, ResolutionOutcome::SkippedProcessed);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn overlapping_invocations_are_single_flight() {
        let dispatcher = Arc::new(CountingDispatcher::slow(Duration::from_millis(100)));
        let resolver = Arc::new(DisputeResolver::new(
            Arc::new(MemoryMarkerStore::new()),
            Arc::clone(&dispatcher) as _,
        ));
        let c = case("case-race");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let resolver = Arc::clone(&resolver);
            let c = c.clone();
            handles.push(tokio::spawn(async move { resolver.resolve(&c).await }));
        }

        let mut dispatched = 0;
        let mut skipped = 0;
        for h in handles {
            match h.await.unwrap().unwrap() {
                ResolutionOutcome::Dispatched => dispatched += 1,
                _ => skipped += 1,
            }
        }
        assert_eq!(dispatched, 1);
        assert_eq!(skipped, 3);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_leaves_no_marker_and_retries() {
        let dispatcher = Arc::new(CountingDispatcher::failing_once());
        let resolver = DisputeResolver::new(
            Arc::new(MemoryMarkerStore::new()),
            Arc::clone(&dispatcher) as _,
        );
        let c = case("case-flaky");

        assert!(resolver.resolve(&c).await.is_err());
        // Next scheduled pass retries and succeeds.
        assert_eq!(resolver.resolve(&c).await.unwrap(), ResolutionOutcome::Dispatched);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn report_pass_tallies_outcomes() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let markers = Arc::new(MemoryMarkerStore::new());
        markers.mark_processed(&CaseId::new("case-done")).await.unwrap();
        let resolver = DisputeResolver::new(markers, Arc::clone(&dispatcher) as _);

        let report = ScanReport {
            from_block: 0,
            to_block: 1_000,
            resolvable: vec![
                CaseReport {
                    case: case("case-a"),
                    resolvable: true,
                    settled: Some(false),
                },
                CaseReport {
                    case: case("case-done"),
                    resolvable: true,
                    settled: Some(true),
                },
            ],
            pending: vec![],
        };

        let summary = resolver.resolve_report(&report).await;
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(dispatcher.count(), 1);
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use fluxline_engine::{Batch, BatchRunner, ErrorRetentionCache, Stage};
use fluxline_state::{ErrorRecordStore, OffsetTracker, SnapshotStore, StateError};
use fluxline_types::delivery::DeliveryGuarantee;
use fluxline_types::error::StageError;
use fluxline_types::pipeline::PipelineId;
use fluxline_types::record::{ErrorRecord, Iso8601Timestamp, Record};
use fluxline_types::snapshot::StageOutput;
use fluxline_types::stage::{StageId, StageType};

const BATCH_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Stage(usize),
    Commit,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

/// In-memory tracker that logs every commit.
struct ListTracker {
    log: EventLog,
    committed: Mutex<Option<String>>,
    staged: Mutex<Option<String>>,
    finished: AtomicBool,
}

impl ListTracker {
    fn new(log: EventLog) -> Self {
        Self {
            log,
            committed: Mutex::new(None),
            staged: Mutex::new(None),
            finished: AtomicBool::new(false),
        }
    }
}

impl OffsetTracker for ListTracker {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn offset(&self) -> Option<String> {
        self.committed.lock().expect("offset lock").clone()
    }

    fn set_offset(&self, offset: Option<String>) {
        *self.staged.lock().expect("offset lock") = offset;
    }

    fn commit_offset(&self) -> Result<(), StateError> {
        let staged = self.staged.lock().expect("offset lock").take();
        if staged.is_none() {
            self.finished.store(true, Ordering::Release);
        }
        *self.committed.lock().expect("offset lock") = staged;
        self.log.lock().expect("event log").push(Event::Commit);
        Ok(())
    }
}

/// Snapshot store that counts stores and keeps the last snapshot.
#[derive(Default)]
struct CountingSnapshotStore {
    calls: AtomicUsize,
    last: Mutex<Vec<StageOutput>>,
}

impl SnapshotStore for CountingSnapshotStore {
    fn exists(&self, _pipeline: &PipelineId) -> Result<bool, StateError> {
        Ok(self.calls.load(Ordering::SeqCst) > 0)
    }

    fn retrieve(&self, _pipeline: &PipelineId) -> Result<Vec<StageOutput>, StateError> {
        Ok(self.last.lock().expect("snapshot lock").clone())
    }

    fn store(&self, _pipeline: &PipelineId, snapshot: &[StageOutput]) -> Result<(), StateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().expect("snapshot lock") = snapshot.to_vec();
        Ok(())
    }
}

/// Error store that accepts everything.
struct NullErrorStore;

impl ErrorRecordStore for NullErrorStore {
    fn store(
        &self,
        _pipeline: &PipelineId,
        errors: &BTreeMap<StageId, Vec<ErrorRecord>>,
    ) -> Result<u64, StateError> {
        Ok(errors.values().map(Vec::len).sum::<usize>() as u64)
    }
}

/// Chain stage that logs its position; the source variant pages through a
/// synthetic dataset of `total` records.
struct ChainStage {
    index: usize,
    id: StageId,
    kind: StageType,
    log: EventLog,
    cursor: usize,
    total: usize,
}

impl ChainStage {
    fn new(index: usize, kind: StageType, total: usize, log: &EventLog) -> Self {
        Self {
            index,
            id: StageId::new(format!("stage-{index}")),
            kind,
            log: Arc::clone(log),
            cursor: 0,
            total,
        }
    }
}

impl Stage for ChainStage {
    fn id(&self) -> &StageId {
        &self.id
    }

    fn stage_type(&self) -> StageType {
        self.kind
    }

    fn process(&mut self, batch: &mut Batch) -> Result<(), StageError> {
        if self.kind == StageType::Source {
            if let Some(offset) = batch.previous_offset() {
                self.cursor = offset.parse().unwrap_or(self.cursor);
            }
            let take = batch.batch_size().min(self.total - self.cursor);
            batch.fill(
                (self.cursor..self.cursor + take)
                    .map(|i| Record::new(format!("r{i}"), serde_json::Value::Null))
                    .collect(),
            );
            self.cursor += take;
            batch.set_new_offset((self.cursor < self.total).then(|| self.cursor.to_string()));
        }
        self.log.lock().expect("event log").push(Event::Stage(self.index));
        Ok(())
    }
}

fn build_runner(
    delivery: DeliveryGuarantee,
    log: &EventLog,
    snapshots: &Arc<CountingSnapshotStore>,
) -> BatchRunner {
    BatchRunner::new(
        PipelineId::new("prop-pipeline"),
        delivery,
        BATCH_SIZE,
        Arc::new(ListTracker::new(Arc::clone(log))) as Arc<dyn OffsetTracker>,
        Arc::clone(snapshots) as Arc<dyn SnapshotStore>,
        Arc::new(NullErrorStore) as Arc<dyn ErrorRecordStore>,
    )
}

fn build_chain(kinds: &[StageType], total: usize, log: &EventLog) -> Vec<Box<dyn Stage>> {
    kinds
        .iter()
        .enumerate()
        .map(|(index, kind)| {
            Box::new(ChainStage::new(index, *kind, total, log)) as Box<dyn Stage>
        })
        .collect()
}

fn delivery_strategy() -> impl Strategy<Value = DeliveryGuarantee> {
    prop_oneof![
        Just(DeliveryGuarantee::AtMostOnce),
        Just(DeliveryGuarantee::AtLeastOnce),
    ]
}

fn tail_strategy() -> impl Strategy<Value = Vec<StageType>> {
    proptest::collection::vec(
        prop_oneof![Just(StageType::Processor), Just(StageType::Target)],
        1..6,
    )
}

proptest! {
    #[test]
    fn every_batch_commits_exactly_once_at_the_guarantee_position(
        delivery in delivery_strategy(),
        tail in tail_strategy(),
        batches in 1..5_usize,
        last_batch_fill in 1..=BATCH_SIZE,
    ) {
        let mut chain = vec![StageType::Source];
        chain.extend(tail);
        if !chain.contains(&StageType::Target) {
            chain.push(StageType::Target);
        }
        let total = (batches - 1) * BATCH_SIZE + last_batch_fill;

        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let snapshots = Arc::new(CountingSnapshotStore::default());
        let runner = build_runner(delivery, &log, &snapshots);
        let mut stages = build_chain(&chain, total, &log);

        runner.run(&mut stages).expect("run must complete");

        let first_target = chain
            .iter()
            .position(|kind| *kind == StageType::Target)
            .expect("chain has a target");
        let mut expected = Vec::new();
        for _ in 0..batches {
            match delivery {
                DeliveryGuarantee::AtMostOnce => {
                    for index in 0..chain.len() {
                        if index == first_target {
                            expected.push(Event::Commit);
                        }
                        expected.push(Event::Stage(index));
                    }
                }
                DeliveryGuarantee::AtLeastOnce => {
                    for index in 0..chain.len() {
                        expected.push(Event::Stage(index));
                    }
                    expected.push(Event::Commit);
                }
            }
        }

        let observed = log.lock().expect("event log").clone();
        prop_assert_eq!(observed, expected);
    }

    #[test]
    fn capture_is_consumed_by_exactly_one_batch(
        delivery in delivery_strategy(),
        batches in 1..5_usize,
        capture_size in 1..=5_usize,
    ) {
        let chain = [StageType::Source, StageType::Target];
        let total = batches * BATCH_SIZE;

        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let snapshots = Arc::new(CountingSnapshotStore::default());
        let runner = build_runner(delivery, &log, &snapshots);
        let mut stages = build_chain(&chain, total, &log);

        runner.capture_next_batch(capture_size).expect("arm must succeed");
        runner.run(&mut stages).expect("run must complete");

        prop_assert_eq!(snapshots.calls.load(Ordering::SeqCst), 1);
        let snapshot = snapshots.last.lock().expect("snapshot lock").clone();
        prop_assert_eq!(snapshot.len(), chain.len());
        for output in &snapshot {
            prop_assert!(output.records.len() <= capture_size);
        }
    }

    #[test]
    fn retention_keeps_the_last_capacity_records(
        counts in proptest::collection::vec(0..40_usize, 1..8),
    ) {
        let stage = StageId::new("flaky");
        let mut cache = ErrorRetentionCache::with_capacity(10);
        let mut all = Vec::new();

        for (batch, count) in counts.iter().enumerate() {
            let records: Vec<ErrorRecord> = (0..*count)
                .map(|i| ErrorRecord {
                    record: Record::new(format!("b{batch}-e{i}"), serde_json::Value::Null),
                    error_message: "rejected".to_string(),
                    failed_at: Iso8601Timestamp("2026-02-21T00:00:00Z".to_string()),
                })
                .collect();
            all.extend(records.iter().cloned());
            let mut group = BTreeMap::new();
            group.insert(stage.clone(), records);
            cache.absorb(&group);
        }

        let recent = cache.recent(&stage);
        prop_assert!(recent.len() <= 10);
        let keep = all.len().min(10);
        let expected: Vec<ErrorRecord> = all[all.len() - keep..].to_vec();
        prop_assert_eq!(recent, expected);
    }
}

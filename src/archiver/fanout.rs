use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, warn};

use crate::actual::LedgerApi;
use crate::actual::model::TransactionPatch;
use crate::archiver::collect::{ArchiveRecord, annotate_notes};

/// Sort key for failures not tied to a record.
const WORKER_FAILURE: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub updated: usize,
    pub failures: Vec<UpdateFailure>,
    /// Records never sent, because a capped run stopped after a failure or
    /// no worker could be started.
    pub skipped: usize,
}

impl FanoutSummary {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Starts one scoped notes-update worker. The OS may refuse.
trait WorkerSpawner {
    fn spawn<'scope, 'env, F, T>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        work: F,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, T>>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope;
}

struct OsThreads;

impl WorkerSpawner for OsThreads {
    fn spawn<'scope, 'env, F, T>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        work: F,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, T>>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        thread::Builder::new()
            .name("notes-update".to_string())
            .spawn_scoped(scope, work)
    }
}

/// Stamps provenance into the notes of every record and waits for all
/// updates to settle.
///
/// `max_concurrency == 0` sends every update at once. A non-zero cap runs
/// that many workers over a shared cursor; they stop drawing records once
/// any update fails. When the OS refuses more threads, the workers already
/// running drain the remaining records; if none could start, the run is
/// reported as failed.
pub fn annotate_all<L: LedgerApi + ?Sized>(
    ledger: &L,
    records: &[ArchiveRecord],
    category_name: &str,
    max_concurrency: usize,
) -> FanoutSummary {
    annotate_with(ledger, records, category_name, max_concurrency, &OsThreads)
}

fn annotate_with<L: LedgerApi + ?Sized, S: WorkerSpawner>(
    ledger: &L,
    records: &[ArchiveRecord],
    category_name: &str,
    max_concurrency: usize,
    spawner: &S,
) -> FanoutSummary {
    if records.is_empty() {
        return FanoutSummary::default();
    }

    let capped = max_concurrency > 0;
    let workers = if capped {
        max_concurrency.min(records.len())
    } else {
        records.len()
    };
    debug!(records = records.len(), workers, "dispatching notes updates");

    let cursor = AtomicUsize::new(0);
    let halted = AtomicBool::new(false);

    let mut updated = 0usize;
    let mut failures: Vec<(usize, UpdateFailure)> = Vec::new();

    let work = || {
        let mut done = 0usize;
        let mut failed = Vec::new();
        loop {
            if capped && halted.load(Ordering::SeqCst) {
                break;
            }
            let idx = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(record) = records.get(idx) else {
                break;
            };
            let patch = TransactionPatch {
                notes: annotate_notes(category_name, record.notes.as_deref()),
            };
            match ledger.update_transaction(&record.id, &patch) {
                Ok(()) => done += 1,
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(transaction_id = %record.id, %error, "notes update failed");
                    halted.store(true, Ordering::SeqCst);
                    failed.push((
                        idx,
                        UpdateFailure {
                            id: record.id.clone(),
                            error,
                        },
                    ));
                }
            }
        }
        (done, failed)
    };

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            match spawner.spawn(scope, work) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!(
                        started = handles.len(),
                        wanted = workers,
                        error = %err,
                        "could not start more notes update workers"
                    );
                    if handles.is_empty() {
                        failures.push((
                            WORKER_FAILURE,
                            UpdateFailure {
                                id: "<worker>".to_string(),
                                error: format!("failed to start notes update worker: {err}"),
                            },
                        ));
                    }
                    break;
                }
            }
        }

        for handle in handles {
            match handle.join() {
                Ok((done, mut failed)) => {
                    updated += done;
                    failures.append(&mut failed);
                }
                Err(_) => failures.push((
                    WORKER_FAILURE,
                    UpdateFailure {
                        id: "<worker>".to_string(),
                        error: "notes update worker panicked".to_string(),
                    },
                )),
            }
        }
    });

    failures.sort_by_key(|(idx, _)| *idx);
    let record_failures = failures
        .iter()
        .filter(|(idx, _)| *idx != WORKER_FAILURE)
        .count();
    let skipped = records.len().saturating_sub(updated + record_failures);
    FanoutSummary {
        updated,
        failures: failures.into_iter().map(|(_, f)| f).collect(),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::collect::RecordKind;
    use crate::archiver::testing::FakeLedger;

    /// Starts `allow` real workers, then fails the way a thread limit does.
    struct RefusingSpawner {
        allow: usize,
        started: AtomicUsize,
    }

    impl RefusingSpawner {
        fn new(allow: usize) -> Self {
            Self {
                allow,
                started: AtomicUsize::new(0),
            }
        }
    }

    impl WorkerSpawner for RefusingSpawner {
        fn spawn<'scope, 'env, F, T>(
            &self,
            scope: &'scope thread::Scope<'scope, 'env>,
            work: F,
        ) -> io::Result<thread::ScopedJoinHandle<'scope, T>>
        where
            F: FnOnce() -> T + Send + 'scope,
            T: Send + 'scope,
        {
            if self.started.fetch_add(1, Ordering::SeqCst) >= self.allow {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "Resource temporarily unavailable",
                ));
            }
            OsThreads.spawn(scope, work)
        }
    }

    fn records(ids: &[&str]) -> Vec<ArchiveRecord> {
        ids.iter()
            .map(|id| ArchiveRecord {
                id: id.to_string(),
                kind: RecordKind::TopLevel,
                notes: Some(format!("note {id}")),
            })
            .collect()
    }

    #[test]
    fn empty_set_sends_nothing() {
        let ledger = FakeLedger::default();
        let summary = annotate_all(&ledger, &[], "Dining", 0);
        assert_eq!(summary, FanoutSummary::default());
        assert!(ledger.updates().is_empty());
    }

    #[test]
    fn unbounded_updates_every_record() {
        let ledger = FakeLedger::default();
        let summary = annotate_all(&ledger, &records(&["a", "b", "c", "d"]), "Dining", 0);
        assert!(summary.ok());
        assert_eq!(summary.updated, 4);

        let mut updates = ledger.updates();
        updates.sort();
        assert_eq!(
            updates,
            vec![
                ("a".to_string(), "[source:Dining] | note a".to_string()),
                ("b".to_string(), "[source:Dining] | note b".to_string()),
                ("c".to_string(), "[source:Dining] | note c".to_string()),
                ("d".to_string(), "[source:Dining] | note d".to_string()),
            ]
        );
    }

    #[test]
    fn capped_run_still_covers_all_records() {
        let ledger = FakeLedger::default();
        let ids: Vec<String> = (0..25).map(|i| format!("t{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let summary = annotate_all(&ledger, &records(&id_refs), "Dining", 3);
        assert!(summary.ok());
        assert_eq!(summary.updated, 25);
        assert_eq!(ledger.updates().len(), 25);
    }

    #[test]
    fn unbounded_failure_is_reported_while_others_land() {
        let ledger = FakeLedger::default().failing_update("b");
        let summary = annotate_all(&ledger, &records(&["a", "b", "c"]), "Dining", 0);
        assert!(!summary.ok());
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].id, "b");
    }

    #[test]
    fn single_worker_stops_after_first_failure() {
        let ledger = FakeLedger::default().failing_update("b");
        let summary = annotate_all(&ledger, &records(&["a", "b", "c", "d"]), "Dining", 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(ledger.updates().len(), 1);
    }

    #[test]
    fn refused_threads_fall_back_to_running_workers() {
        let ledger = FakeLedger::default();
        let ids: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let spawner = RefusingSpawner::new(2);
        let summary = annotate_with(&ledger, &records(&id_refs), "Dining", 0, &spawner);
        assert!(summary.ok());
        assert_eq!(summary.updated, 10);
        assert_eq!(summary.skipped, 0);
        assert_eq!(ledger.updates().len(), 10);
    }

    #[test]
    fn no_worker_started_is_a_failure_not_a_panic() {
        let ledger = FakeLedger::default();
        let spawner = RefusingSpawner::new(0);
        let summary = annotate_with(&ledger, &records(&["a", "b", "c"]), "Dining", 0, &spawner);
        assert!(!summary.ok());
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].id, "<worker>");
        assert!(
            summary.failures[0]
                .error
                .contains("failed to start notes update worker")
        );
        assert!(ledger.updates().is_empty());
    }
}

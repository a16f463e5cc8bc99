//! Resource-bounded, fault-isolated execution of one task per record.
//!
//! Each task resolves the record's table, runs the [`RecordProcessor`] and
//! writes the kept table with an [`OutputWriter`]. A task holds its
//! [`TaskReservation`] for its whole lifetime and only starts once the
//! reservation fits into the remaining [`ResourceCapacity`].
//!
//! Nothing that goes wrong inside a task escapes it: errors and panics become
//! [`DispatchOutcome::Failed`], carrying the untouched input record. The one
//! exception is [`DispatchConfig::strict_decode`], under which an undecodable
//! record aborts [`TaskDispatcher::dispatch_batch`] before any task runs.
//!
//! Tasks have no timeout. A task that never returns blocks its caller.

use crate::config::{DispatchConfig, ExecMode, OutputFormat, ResourceCapacity, TaskReservation};
use crate::error::{SieveError, WriteError};
use crate::filters::Stage;
use crate::io::writer::OutputWriter;
use crate::processor::{ProcessOutcome, RecordProcessor, RejectReason};
use crate::record::Record;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};
use tracing::{debug, error, warn};

/// Category of a contained failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The table payload was missing or not valid Arrow IPC.
    Decode,
    /// The output format cannot encode the processed table.
    Incompatible,
    Io,
    /// The task panicked.
    Panicked,
    Other,
}

impl FailureKind {
    #[must_use]
    pub const fn classify(err: &SieveError) -> Self {
        match err {
            SieveError::MissingTable { .. } | SieveError::Decode { .. } => Self::Decode,
            SieveError::Write(WriteError::Incompatible { .. }) => Self::Incompatible,
            SieveError::Write(WriteError::Io(_)) => Self::Io,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Incompatible => "incompatible",
            Self::Io => "io",
            Self::Panicked => "panicked",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record result of a dispatch. Every variant carries the original record.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The processed table was written to `path`.
    Written {
        record: Record,
        path: PathBuf,
        rows: usize,
        columns: usize,
    },
    /// Filtering rejected the record; nothing was written.
    Rejected { record: Record, reason: RejectReason },
    /// The task failed; nothing was written.
    Failed {
        record: Record,
        kind: FailureKind,
        error: String,
    },
}

impl DispatchOutcome {
    #[must_use]
    pub const fn record(&self) -> &Record {
        match self {
            Self::Written { record, .. } | Self::Rejected { record, .. } | Self::Failed { record, .. } => {
                record
            }
        }
    }

    #[must_use]
    pub fn into_record(self) -> Record {
        match self {
            Self::Written { record, .. } | Self::Rejected { record, .. } | Self::Failed { record, .. } => {
                record
            }
        }
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.record().content_hash
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written { path, .. } => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Summary of a dispatched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub written: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Rejections by reason code.
    pub rejections: BTreeMap<&'static str, usize>,
    /// `emptied` rejections by the stage that emptied the table.
    pub emptied_by_stage: BTreeMap<Stage, usize>,
    pub failures: BTreeMap<FailureKind, usize>,
    pub outputs: Vec<PathBuf>,
}

impl BatchReport {
    #[must_use]
    pub fn from_outcomes(outcomes: &[DispatchOutcome]) -> Self {
        let mut report = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                DispatchOutcome::Written { path, .. } => {
                    report.written += 1;
                    report.outputs.push(path.clone());
                }
                DispatchOutcome::Rejected { reason, .. } => {
                    report.rejected += 1;
                    *report.rejections.entry(reason.code()).or_default() += 1;
                    if let RejectReason::Emptied { stage } = reason {
                        *report.emptied_by_stage.entry(*stage).or_default() += 1;
                    }
                }
                DispatchOutcome::Failed { kind, .. } => {
                    report.failed += 1;
                    *report.failures.entry(*kind).or_default() += 1;
                }
            }
        }
        report
    }
}

#[derive(Debug, Default)]
struct Usage {
    cpus: usize,
    memory_bytes: u64,
}

/// Counting gate over CPU and memory.
#[derive(Debug)]
struct AdmissionGate {
    capacity: ResourceCapacity,
    in_use: Mutex<Usage>,
    freed: Condvar,
}

impl AdmissionGate {
    fn new(capacity: ResourceCapacity) -> Self {
        Self {
            capacity,
            in_use: Mutex::new(Usage::default()),
            freed: Condvar::new(),
        }
    }

    fn fits(&self, usage: &Usage, r: TaskReservation) -> bool {
        usage.cpus.saturating_add(r.num_cpus) <= self.capacity.num_cpus
            && usage.memory_bytes.saturating_add(r.memory_bytes) <= self.capacity.memory_bytes
    }

    /// Block until `r` fits, then hold it until the permit drops.
    fn acquire(&self, r: TaskReservation) -> Permit<'_> {
        let mut usage = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.fits(&usage, r) {
            usage = self
                .freed
                .wait(usage)
                .unwrap_or_else(PoisonError::into_inner);
        }
        usage.cpus += r.num_cpus;
        usage.memory_bytes += r.memory_bytes;
        Permit {
            gate: self,
            reservation: r,
        }
    }
}

struct Permit<'a> {
    gate: &'a AdmissionGate,
    reservation: TaskReservation,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut usage = self
            .gate
            .in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        usage.cpus -= self.reservation.num_cpus;
        usage.memory_bytes -= self.reservation.memory_bytes;
        drop(usage);
        self.gate.freed.notify_all();
    }
}

/// What a task produced before its record is reattached.
enum TaskStep {
    Written {
        path: PathBuf,
        rows: usize,
        columns: usize,
    },
    Rejected(RejectReason),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked with a non-string payload".to_string())
}

const fn format_enabled(format: OutputFormat) -> bool {
    match format {
        OutputFormat::Csv => cfg!(feature = "io-csv"),
        OutputFormat::Parquet => cfg!(feature = "io-parquet"),
    }
}

/// Runs records through a [`RecordProcessor`] and an [`OutputWriter`], one
/// isolated task per record.
pub struct TaskDispatcher {
    processor: RecordProcessor,
    writer: OutputWriter,
    reservation: TaskReservation,
    gate: AdmissionGate,
    pool: Option<ThreadPool>,
    strict_decode: bool,
}

impl fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("processor", &self.processor)
            .field("writer", &self.writer)
            .field("reservation", &self.reservation)
            .field("capacity", &self.gate.capacity)
            .field("workers", &self.workers())
            .field("strict_decode", &self.strict_decode)
            .finish()
    }
}

impl TaskDispatcher {
    /// Build a dispatcher, and its worker pool in parallel mode.
    ///
    /// # Errors
    /// [`SieveError::Config`] if the filter config is invalid, the output
    /// format is not compiled in, a single reservation exceeds the capacity,
    /// or the pool cannot be started.
    pub fn new(processor: RecordProcessor, config: DispatchConfig) -> Result<Self, SieveError> {
        processor.config().validate()?;
        if !format_enabled(config.output_format) {
            return Err(SieveError::Config(
                WriteError::FormatDisabled(config.output_format.extension()).to_string(),
            ));
        }
        if !config.capacity.admits(&config.reservation) {
            return Err(SieveError::Config(format!(
                "task reservation ({} cpus, {} bytes) exceeds capacity ({} cpus, {} bytes)",
                config.reservation.num_cpus,
                config.reservation.memory_bytes,
                config.capacity.num_cpus,
                config.capacity.memory_bytes,
            )));
        }

        let pool = match config.mode {
            ExecMode::Sequential => None,
            ExecMode::Parallel { workers } => {
                let threads = workers
                    .unwrap_or_else(|| {
                        config
                            .capacity
                            .concurrent_slots(&config.reservation)
                            .min(config.capacity.num_cpus)
                    })
                    .max(1);
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("ironsieve-worker-{i}"))
                    .build()
                    .map_err(|e| SieveError::Config(format!("start worker pool: {e}")))?;
                Some(pool)
            }
        };

        let writer = OutputWriter::new(config.base_path, config.output_format)
            .with_parquet_compression(config.parquet_compression);
        Ok(Self {
            processor,
            writer,
            reservation: config.reservation,
            gate: AdmissionGate::new(config.capacity),
            pool,
            strict_decode: config.strict_decode,
        })
    }

    /// Number of threads tasks run on; 1 in sequential mode.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, ThreadPool::current_num_threads)
    }

    #[must_use]
    pub const fn processor(&self) -> &RecordProcessor {
        &self.processor
    }

    #[must_use]
    pub const fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// Process and write one record, blocking until its task completes.
    ///
    /// Failures, decode failures included, are returned as
    /// [`DispatchOutcome::Failed`].
    pub fn dispatch(&self, record: Record) -> DispatchOutcome {
        let run = || {
            self.run_task(record)
                .unwrap_or_else(|(record, err)| self.contain_decode_failure(record, &err))
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Dispatch every record, concurrently in parallel mode, and return the
    /// outcomes in input order.
    ///
    /// With `strict_decode` every record's table is resolved before any task
    /// starts, so an abort never leaves output files behind.
    ///
    /// # Errors
    /// Only with `strict_decode`: the decode error of an undecodable record.
    /// No record is processed or written in that case.
    pub fn dispatch_batch(&self, records: Vec<Record>) -> Result<Vec<DispatchOutcome>, SieveError> {
        debug!(records = records.len(), workers = self.workers(), "dispatching batch");
        if self.strict_decode {
            self.check_decodable(&records)?;
        }
        let handle = |record: Record| {
            self.run_task(record)
                .unwrap_or_else(|(record, err)| self.contain_decode_failure(record, &err))
        };
        Ok(match &self.pool {
            Some(pool) => pool.install(|| records.into_par_iter().map(handle).collect()),
            None => records.into_iter().map(handle).collect(),
        })
    }

    /// Resolve every record's table under the admission gate and drop it.
    /// A panic while decoding is left for the task itself to contain.
    fn check_decodable(&self, records: &[Record]) -> Result<(), SieveError> {
        let check = |record: &Record| {
            let _permit = self.gate.acquire(self.reservation);
            match panic::catch_unwind(AssertUnwindSafe(|| record.resolve_table())) {
                Ok(Err(err)) => {
                    error!(content_hash = %record.content_hash, error = %err, "aborting batch on undecodable record");
                    Err(err)
                }
                Ok(Ok(_)) | Err(_) => Ok(()),
            }
        };
        match &self.pool {
            Some(pool) => pool.install(|| records.par_iter().try_for_each(check)),
            None => records.iter().try_for_each(check),
        }
    }

    /// Run one task under the admission gate. Decode failures are handed back
    /// with the record so they are logged apart from processing failures.
    fn run_task(&self, record: Record) -> Result<DispatchOutcome, (Record, SieveError)> {
        let _permit = self.gate.acquire(self.reservation);
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_and_write(&record)));
        match result {
            Ok(Ok(TaskStep::Written {
                path,
                rows,
                columns,
            })) => {
                debug!(content_hash = %record.content_hash, path = %path.display(), rows, columns, "record written");
                Ok(DispatchOutcome::Written {
                    record,
                    path,
                    rows,
                    columns,
                })
            }
            Ok(Ok(TaskStep::Rejected(reason))) => Ok(DispatchOutcome::Rejected { record, reason }),
            Ok(Err(err)) if err.is_decode() => Err((record, err)),
            Ok(Err(err)) => {
                let kind = FailureKind::classify(&err);
                warn!(content_hash = %record.content_hash, %kind, error = %err, "record failed");
                Ok(DispatchOutcome::Failed {
                    record,
                    kind,
                    error: err.to_string(),
                })
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(content_hash = %record.content_hash, panic = %message, "record task panicked");
                Ok(DispatchOutcome::Failed {
                    record,
                    kind: FailureKind::Panicked,
                    error: message,
                })
            }
        }
    }

    fn process_and_write(&self, record: &Record) -> Result<TaskStep, SieveError> {
        match self.processor.process_record(record)? {
            ProcessOutcome::Rejected(reason) => Ok(TaskStep::Rejected(reason)),
            ProcessOutcome::Kept(table) => {
                let path = self.writer.write(&record.content_hash, &table)?;
                Ok(TaskStep::Written {
                    path,
                    rows: table.num_rows(),
                    columns: table.num_columns(),
                })
            }
        }
    }

    fn contain_decode_failure(&self, record: Record, err: &SieveError) -> DispatchOutcome {
        error!(content_hash = %record.content_hash, error = %err, "record table could not be decoded");
        DispatchOutcome::Failed {
            record,
            kind: FailureKind::Decode,
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn gate_never_exceeds_capacity() {
        let gate = Arc::new(AdmissionGate::new(ResourceCapacity {
            num_cpus: 2,
            memory_bytes: 100,
        }));
        let r = TaskReservation {
            num_cpus: 1,
            memory_bytes: 40,
        };
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (gate, current, peak) = (Arc::clone(&gate), Arc::clone(&current), Arc::clone(&peak));
                thread::spawn(move || {
                    let _permit = gate.acquire(r);
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        let usage = gate.in_use.lock().unwrap();
        assert_eq!((usage.cpus, usage.memory_bytes), (0, 0));
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let caught = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom");
        let caught = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "formatted 1");
    }

    #[test]
    fn report_counts_outcomes() {
        let rec = Record::from_arrow_bytes("h", Vec::<u8>::new());
        let outcomes = vec![
            DispatchOutcome::Written {
                record: rec.clone(),
                path: PathBuf::from("out/h__1.csv"),
                rows: 3,
                columns: 2,
            },
            DispatchOutcome::Rejected {
                record: rec.clone(),
                reason: RejectReason::Emptied { stage: Stage::Pii },
            },
            DispatchOutcome::Rejected {
                record: rec.clone(),
                reason: RejectReason::TooFewRows { rows: 1, min_rows: 5 },
            },
            DispatchOutcome::Failed {
                record: rec,
                kind: FailureKind::Incompatible,
                error: "x".into(),
            },
        ];
        let report = BatchReport::from_outcomes(&outcomes);
        assert_eq!((report.total, report.written, report.rejected, report.failed), (4, 1, 2, 1));
        assert_eq!(report.rejections.get("emptied"), Some(&1));
        assert_eq!(report.rejections.get("too_few_rows"), Some(&1));
        assert_eq!(report.emptied_by_stage.get(&Stage::Pii), Some(&1));
        assert_eq!(report.failures.get(&FailureKind::Incompatible), Some(&1));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["emptied_by_stage"]["pii"], 1);
        assert_eq!(json["failures"]["incompatible"], 1);
    }
}

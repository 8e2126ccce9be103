//! Runs many designations through the engine and aggregates the outcomes.
//!
//! Designations are independent, so the async runner fans them out over a
//! bounded pool of blocking workers. Only `ExternalUnavailable` failures are
//! retried, with exponential backoff between attempts.

mod report;
mod selection;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::designation::{Designation, DesignationCodec, MpcDesignationCodec};
use crate::pipeline::catalog::CatalogBackend;
use crate::pipeline::engine::{Assessment, AssessmentEngine, RunSignal};
use crate::pipeline::fitter::FitterGateway;

pub use report::{BandSummary, BatchEntry, BatchReport, BatchSummary, CodeCount, FailureCount};
pub use selection::{random_subset, read_designation_list};

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier namespacing one run's processing directories and report.
pub fn new_run_id() -> String {
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("run-{}-{seq:03}", Utc::now().format("%Y%m%dT%H%M%S"))
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub deadline: Option<Duration>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            deadline: None,
        }
    }
}

impl From<&PipelineConfig> for BatchSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            deadline: config.deadline,
        }
    }
}

impl BatchSettings {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor)
    }
}

pub struct BatchRunner<B, G> {
    engine: Arc<AssessmentEngine<B, G>>,
    codec: Arc<dyn DesignationCodec>,
    settings: BatchSettings,
    run_id: String,
}

impl<B, G> BatchRunner<B, G>
where
    B: CatalogBackend + 'static,
    G: FitterGateway + 'static,
{
    pub fn new(engine: Arc<AssessmentEngine<B, G>>, settings: BatchSettings) -> Self {
        Self {
            engine,
            codec: Arc::new(MpcDesignationCodec),
            settings,
            run_id: new_run_id(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn DesignationCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Signal carrying the configured run deadline, if any.
    pub fn signal(&self) -> RunSignal {
        match self.settings.deadline {
            Some(deadline) => RunSignal::with_deadline(deadline),
            None => RunSignal::new(),
        }
    }

    /// One designation after another on the calling thread.
    pub fn run_sequential(&self, inputs: &[String], signal: &RunSignal) -> BatchReport {
        info!(run_id = %self.run_id, count = inputs.len(), "sequential batch started");
        let entries = inputs
            .iter()
            .map(|input| match Designation::parse(input, self.codec.as_ref()) {
                Ok(designation) => {
                    let (assessment, attempts) = self.assess_blocking(&designation, signal);
                    BatchEntry::from_assessment(input.as_str(), assessment, attempts)
                }
                Err(err) => BatchEntry::invalid(input.as_str(), &err),
            })
            .collect();
        self.finish(entries)
    }

    /// Bounded-concurrency run; entries come back in input order.
    pub async fn run(&self, inputs: Vec<String>, signal: &RunSignal) -> BatchReport {
        let workers = self.settings.workers.max(1);
        info!(run_id = %self.run_id, count = inputs.len(), workers, "batch started");

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut slots: Vec<Option<BatchEntry>> = Vec::with_capacity(inputs.len());
        let mut tasks = JoinSet::new();

        for (index, input) in inputs.iter().enumerate() {
            let designation = match Designation::parse(input, self.codec.as_ref()) {
                Ok(designation) => designation,
                Err(err) => {
                    slots.push(Some(BatchEntry::invalid(input.as_str(), &err)));
                    continue;
                }
            };
            slots.push(None);

            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            let settings = self.settings.clone();
            let signal = signal.clone();
            let input = input.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let entry =
                        BatchEntry::aborted(input, Some(designation), "worker pool closed", 0);
                    return (index, entry);
                };
                let entry = assess_with_retries(engine, designation, input, settings, signal).await;
                (index, entry)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(err) => warn!(run_id = %self.run_id, error = %err, "batch task failed"),
            }
        }

        let entries = slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| BatchEntry::aborted(input, None, "batch task failed", 0))
            })
            .collect();
        self.finish(entries)
    }

    fn assess_blocking(&self, designation: &Designation, signal: &RunSignal) -> (Assessment, u32) {
        let mut attempt = 1;
        loop {
            let assessment = self.engine.assess(designation, signal);
            if !should_retry(&assessment, attempt, &self.settings, signal) {
                return (assessment, attempt);
            }
            let delay = self.settings.backoff_for(attempt);
            log_retry(&assessment, attempt, delay);
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    fn finish(&self, entries: Vec<BatchEntry>) -> BatchReport {
        let report = BatchReport::new(self.run_id.clone(), entries);
        info!(
            run_id = %self.run_id,
            total = report.len(),
            saved = report.saved(),
            upsert_issues = report.upsert_issues(),
            "batch finished"
        );
        report
    }
}

async fn assess_with_retries<B, G>(
    engine: Arc<AssessmentEngine<B, G>>,
    designation: Designation,
    input: String,
    settings: BatchSettings,
    signal: RunSignal,
) -> BatchEntry
where
    B: CatalogBackend + 'static,
    G: FitterGateway + 'static,
{
    let mut attempt = 1;
    loop {
        let worker_engine = Arc::clone(&engine);
        let worker_designation = designation.clone();
        let worker_signal = signal.clone();
        let joined = tokio::task::spawn_blocking(move || {
            worker_engine.assess(&worker_designation, &worker_signal)
        })
        .await;

        let assessment = match joined {
            Ok(assessment) => assessment,
            Err(err) => {
                warn!(designation = %designation, error = %err, "assessment worker failed");
                return BatchEntry::aborted(
                    input,
                    Some(designation),
                    format!("assessment worker failed: {err}"),
                    attempt,
                );
            }
        };

        if !should_retry(&assessment, attempt, &settings, &signal) {
            return BatchEntry::from_assessment(input, assessment, attempt);
        }
        let delay = settings.backoff_for(attempt);
        log_retry(&assessment, attempt, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn should_retry(
    assessment: &Assessment,
    attempt: u32,
    settings: &BatchSettings,
    signal: &RunSignal,
) -> bool {
    assessment.is_retryable() && attempt <= settings.max_retries && !signal.is_cancelled()
}

fn log_retry(assessment: &Assessment, attempt: u32, delay: Duration) {
    warn!(
        designation = %assessment.designation,
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = assessment.error.as_deref().unwrap_or("unavailable"),
        "retrying after external failure"
    );
}

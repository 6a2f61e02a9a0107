// Dispatcher - periodic delivery loop

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::classifier::{ClassifiedError, ErrorClassifier};
use crate::application::config::QueueConfig;
use crate::application::notifier::NotificationEmitter;
use crate::application::retry::{RetryDecision, RetryPlanner};
use crate::domain::{dispatch_order, EmailJob, JobStatus};
use crate::error::Result;
use crate::port::{JobStore, NotificationSink, OutgoingEmail, SendError, Sender, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What happened to one job in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Sent,
    Retried,
    Failed,
    /// Send failed after a cancel request; the job ended `cancelled`
    Cancelled,
    /// Status moved on under us (cancelled, not yet due, already taken)
    Skipped,
}

/// Summary of one dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    /// Another cycle was in flight; nothing was touched
    pub busy: bool,
}

impl CycleReport {
    pub fn busy() -> Self {
        Self {
            busy: true,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Sent => self.sent += 1,
            JobOutcome::Retried => self.retried += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
            JobOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Single-flight guard: clears the flag when the cycle ends, even on early return
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Selects due jobs in priority order and drives them through
/// Sender -> ErrorClassifier -> RetryPlanner, one at a time.
///
/// Holds no job state between cycles; the JobStore owns every record and all
/// writes go through compare-and-set transitions.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    sender: Arc<dyn Sender>,
    classifier: ErrorClassifier,
    retry_planner: RetryPlanner,
    emitter: NotificationEmitter,
    time_provider: Arc<dyn TimeProvider>,
    batch_size: usize,
    poll_interval: Duration,
    startup_delay: Duration,
    in_flight: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        sender: Arc<dyn Sender>,
        sink: Arc<dyn NotificationSink>,
        time_provider: Arc<dyn TimeProvider>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            store,
            sender,
            classifier: ErrorClassifier::new(),
            retry_planner: RetryPlanner::new(config.backoff_schedule_ms.clone()),
            emitter: NotificationEmitter::new(sink, config.default_notify_user.clone()),
            time_provider,
            batch_size: config.batch_size,
            poll_interval: config.poll_interval,
            startup_delay: config.startup_delay,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run the dispatch loop until shutdown: one cycle shortly after startup,
    /// then one per poll interval. Stops between cycles, never mid-send.
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval.as_secs(),
            "Dispatcher started"
        );

        tokio::select! {
            _ = sleep(self.startup_delay) => {},
            _ = shutdown.wait() => {
                info!("Dispatcher stopped before first cycle");
                return;
            }
        }

        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => break,
            }

            match self.run_cycle().await {
                Ok(report) if report.selected > 0 => info!(
                    selected = report.selected,
                    sent = report.sent,
                    retried = report.retried,
                    failed = report.failed,
                    cancelled = report.cancelled,
                    skipped = report.skipped,
                    "Dispatch cycle complete"
                ),
                Ok(report) => debug!(busy = report.busy, "Dispatch cycle found no due jobs"),
                Err(e) => error!(error = %e, "Dispatch cycle failed"),
            }
        }

        info!("Dispatcher stopped");
    }

    /// Run one dispatch cycle. Returns `CycleReport::busy()` if a cycle is already running.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Previous dispatch cycle still running, skipping");
            return Ok(CycleReport::busy());
        };

        let now = self.time_provider.now_millis();
        let mut batch = self.store.list_eligible(now, self.batch_size).await?;
        batch.sort_by(dispatch_order);
        batch.truncate(self.batch_size);

        let mut report = CycleReport {
            selected: batch.len(),
            ..CycleReport::default()
        };

        // Strictly sequential: at most one provider call in flight
        for job in batch {
            let job_id = job.id.clone();
            match self.process_job(job).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to process job");
                    report.record(JobOutcome::Skipped);
                }
            }
        }

        Ok(report)
    }

    async fn process_job(&self, mut job: EmailJob) -> Result<JobOutcome> {
        job.start(self.time_provider.now_millis())?;
        if !self.store.transition(&job, JobStatus::Pending).await? {
            debug!(job_id = %job.id, "Job changed since selection, skipping");
            return Ok(JobOutcome::Skipped);
        }

        info!(
            job_id = %job.id,
            priority = %job.priority,
            attempt = job.current_retries,
            "Sending email"
        );
        let result = self.sender.send(OutgoingEmail::from(&job)).await;

        // The flag only goes false -> true and a moved status exits, so at most
        // one extra round per job.
        loop {
            match self.store.find_by_id(&job.id).await? {
                Some(current) if current.status == JobStatus::Processing => {
                    job.cancel_requested = current.cancel_requested;
                }
                current => {
                    warn!(
                        job_id = %job.id,
                        status = ?current.map(|j| j.status),
                        "Job changed during send, discarding result"
                    );
                    return Ok(JobOutcome::Skipped);
                }
            }

            if let Some(outcome) = self.settle(job.clone(), &result).await? {
                return Ok(outcome);
            }
        }
    }

    /// Commit the send result. `None` means the record changed first.
    async fn settle(
        &self,
        mut job: EmailJob,
        result: &std::result::Result<String, SendError>,
    ) -> Result<Option<JobOutcome>> {
        let now = self.time_provider.now_millis();
        match result {
            Ok(message_id) => {
                if job.cancel_requested {
                    info!(job_id = %job.id, "Cancel requested too late, email already sent");
                }
                job.mark_sent(now, message_id.clone())?;
                if !self.commit(&job).await? {
                    return Ok(None);
                }
                info!(job_id = %job.id, message_id = ?job.message_id, "Email sent");
                self.emitter.sent(&job).await;
                Ok(Some(JobOutcome::Sent))
            }
            Err(err) => self.handle_failure(job, err, now).await,
        }
    }

    /// Classify, plan, transition, notify. Sender errors end here.
    async fn handle_failure(
        &self,
        mut job: EmailJob,
        err: &SendError,
        now: i64,
    ) -> Result<Option<JobOutcome>> {
        let classified = self.classifier.classify(err);

        if job.cancel_requested {
            return self.close_cancelled(job, &classified, now).await;
        }

        match self.retry_planner.plan(&job, &classified) {
            RetryDecision::Retry(delay_ms) => {
                job.schedule_retry(now, delay_ms, classified.message.clone())?;
                if !self.commit(&job).await? {
                    return Ok(None);
                }
                warn!(
                    job_id = %job.id,
                    kind = %classified.kind,
                    current_retries = job.current_retries,
                    delay_ms = delay_ms,
                    error = %classified.message,
                    "Send failed, retry scheduled"
                );
                self.emitter.retry_scheduled(&job, delay_ms, &classified).await;
                Ok(Some(JobOutcome::Retried))
            }
            RetryDecision::Failed => {
                Self::mark_failed(&mut job, &classified, now)?;
                if !self.commit(&job).await? {
                    return Ok(None);
                }
                error!(
                    job_id = %job.id,
                    kind = %classified.kind,
                    current_retries = job.current_retries,
                    error = %classified.message,
                    "Send failed permanently"
                );
                self.emitter.failed(&job, &classified).await;
                Ok(Some(JobOutcome::Failed))
            }
        }
    }

    /// processing -> failed -> cancelled. The job never passes through `pending`,
    /// so no cycle can pick it up in between.
    async fn close_cancelled(
        &self,
        mut job: EmailJob,
        err: &ClassifiedError,
        now: i64,
    ) -> Result<Option<JobOutcome>> {
        job.fail(now, format!("{} (cancelled during send)", err.message))?;
        if !self.commit(&job).await? {
            return Ok(None);
        }
        if !self.store.cancel(&job.id).await? {
            warn!(job_id = %job.id, "Job left failed, it changed before the cancel landed");
            return Ok(Some(JobOutcome::Failed));
        }

        info!(
            job_id = %job.id,
            kind = %err.kind,
            error = %err.message,
            "Send failed after cancel request, job cancelled"
        );
        if err.kind.escalates() {
            self.emitter.escalate(&job, err).await;
        }
        Ok(Some(JobOutcome::Cancelled))
    }

    fn mark_failed(job: &mut EmailJob, err: &ClassifiedError, now: i64) -> Result<()> {
        if err.retryable {
            let message = format!("{} (gave up after {} attempts)", err.message, job.max_retries);
            job.exhaust(now, message)?;
        } else {
            job.fail(now, err.message.clone())?;
        }
        Ok(())
    }

    async fn commit(&self, job: &EmailJob) -> Result<bool> {
        let applied = self.store.transition(job, JobStatus::Processing).await?;
        if !applied {
            debug!(job_id = %job.id, status = %job.status, "Transition lost a race, re-reading");
        }
        Ok(applied)
    }
}

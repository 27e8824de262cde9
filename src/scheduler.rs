// src/scheduler.rs

//! Timer and on-demand triggers for the digest pipeline.
//!
//! A single worker task owns every run. The timer and on-demand callers only
//! enqueue jobs and return; the worker replies through a oneshot channel, so
//! at most one run is ever in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::delivery::Notifier;
use crate::error::{AppError, Result};
use crate::models::{DeliveryConfig, DigestConfig, MAX_INTERVAL_HOURS};
use crate::pipeline::format::NO_NEW_CONTENT;
use crate::pipeline::{DigestOutcome, DigestPipeline};

const QUEUE_CAPACITY: usize = 16;
const SECS_PER_HOUR: u64 = 3600;

/// Terminal result of an on-demand request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestReply {
    /// New content, already split into transport-sized messages
    Digest(Vec<String>),
    NoNewContent,
    /// The run failed; carries a short user-facing description
    Failed(String),
}

impl DigestReply {
    fn from_outcome(outcome: &DigestOutcome, limits: &DeliveryConfig) -> Self {
        if outcome.has_new_content() {
            Self::Digest(outcome.message.chunks(limits))
        } else {
            Self::NoNewContent
        }
    }

    /// Messages to show the requester.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Digest(chunks) => chunks.clone(),
            Self::NoNewContent => vec![NO_NEW_CONTENT.to_string()],
            Self::Failed(reason) => vec![format!("Digest failed: {}", reason)],
        }
    }

    /// All messages joined into one text.
    pub fn text(&self) -> String {
        self.messages().join("\n\n")
    }
}

/// Snapshot of the scheduler state.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// A run is in flight
    pub running: bool,
    pub interval_hours: u64,
    pub channel: Option<String>,
    pub runs_completed: u64,
    pub last_run: Option<DateTime<Utc>>,
}

enum Job {
    Tick,
    OnDemand(oneshot::Sender<DigestReply>),
}

struct SharedState {
    running: AtomicBool,
    runs_completed: AtomicU64,
    last_run: RwLock<Option<DateTime<Utc>>>,
    channel: RwLock<Option<String>>,
}

/// Cloneable handle for on-demand triggers and settings.
#[derive(Clone)]
pub struct SchedulerHandle {
    jobs: mpsc::Sender<Job>,
    state: Arc<SharedState>,
    config: Arc<DigestConfig>,
}

impl SchedulerHandle {
    /// Enqueue a run and return the receiver for its reply.
    pub async fn request_digest(&self) -> Result<oneshot::Receiver<DigestReply>> {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(Job::OnDemand(tx))
            .await
            .map_err(|_| AppError::scheduler("worker stopped"))?;
        Ok(rx)
    }

    /// Enqueue a run and wait for its reply.
    pub async fn digest_now(&self) -> Result<DigestReply> {
        self.request_digest()
            .await?
            .await
            .map_err(|_| AppError::scheduler("request dropped before completion"))
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.state.running.load(Ordering::SeqCst),
            interval_hours: self.config.interval_hours,
            channel: self.state.channel.read().await.clone(),
            runs_completed: self.state.runs_completed.load(Ordering::SeqCst),
            last_run: *self.state.last_run.read().await,
        }
    }

    /// Change the destination of scheduled digests. Admin only.
    pub async fn set_channel(&self, requester: &str, channel: impl Into<String>) -> Result<()> {
        if !self.config.is_admin(requester) {
            log::warn!("Refused channel change requested by {}", requester);
            return Err(AppError::config(format!(
                "{} is not allowed to change the digest channel",
                requester
            )));
        }

        let channel = channel.into();
        log::info!("Digest channel set to {}", channel);
        *self.state.channel.write().await = Some(channel);
        Ok(())
    }
}

/// Running scheduler: worker task plus timer task.
pub struct DigestScheduler {
    handle: SchedulerHandle,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
    timer: JoinHandle<()>,
}

impl DigestScheduler {
    /// Spawn the worker and the timer.
    ///
    /// With `run_on_start` the first tick fires immediately, otherwise after
    /// one interval.
    pub fn start(
        pipeline: Arc<DigestPipeline>,
        notifier: Arc<dyn Notifier>,
        digest: DigestConfig,
        delivery: DeliveryConfig,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(SharedState {
            running: AtomicBool::new(false),
            runs_completed: AtomicU64::new(0),
            last_run: RwLock::new(None),
            channel: RwLock::new(digest.channel.clone()),
        });
        let period = interval_period(digest.interval_hours);
        let first_tick = if digest.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };

        let worker = Worker {
            pipeline,
            notifier,
            limits: delivery,
            state: Arc::clone(&state),
        };
        let worker = tokio::spawn(worker.run(jobs_rx, shutdown_rx.clone()));
        let timer = tokio::spawn(run_timer(
            jobs_tx.clone(),
            Arc::clone(&state),
            first_tick,
            period,
            shutdown_rx,
        ));

        log::info!(
            "Scheduler started: every {} hour(s), run on start: {}",
            digest.interval_hours,
            digest.run_on_start
        );

        Self {
            handle: SchedulerHandle {
                jobs: jobs_tx,
                state,
                config: Arc::new(digest),
            },
            shutdown: shutdown_tx,
            worker,
            timer,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop the timer and the worker; an in-flight run completes first.
    pub async fn shutdown(self) {
        log::info!("Scheduler shutting down");
        let _ = self.shutdown.send(true);
        if let Err(e) = self.timer.await {
            log::warn!("Timer task ended abnormally: {}", e);
        }
        if let Err(e) = self.worker.await {
            log::warn!("Worker task ended abnormally: {}", e);
        }
    }
}

/// Timer period for `interval_hours`, clamped to the accepted range.
fn interval_period(interval_hours: u64) -> Duration {
    Duration::from_secs(interval_hours.clamp(1, MAX_INTERVAL_HOURS) * SECS_PER_HOUR)
}

async fn run_timer(
    jobs: mpsc::Sender<Job>,
    state: Arc<SharedState>,
    first_tick: Instant,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if state.running.load(Ordering::SeqCst) {
                    log::warn!("Previous digest run still in progress, skipping tick");
                    continue;
                }
                if jobs.send(Job::Tick).await.is_err() {
                    break;
                }
            }
        }
    }
}

struct Worker {
    pipeline: Arc<DigestPipeline>,
    notifier: Arc<dyn Notifier>,
    limits: DeliveryConfig,
    state: Arc<SharedState>,
}

impl Worker {
    async fn run(self, mut jobs: mpsc::Receiver<Job>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.handle(job).await;
        }
        log::debug!("Scheduler worker stopped");
    }

    async fn handle(&self, job: Job) {
        match job {
            Job::OnDemand(reply) => {
                let result = self.run_pipeline().await;
                let reply_value = match &result {
                    Ok(outcome) => DigestReply::from_outcome(outcome, &self.limits),
                    Err(e) => {
                        log::error!("On-demand digest failed: {}", e);
                        DigestReply::Failed(e.user_message().to_string())
                    }
                };
                if reply.send(reply_value).is_err() {
                    log::debug!("On-demand requester went away before the reply");
                }
            }
            Job::Tick => {
                // Changes stay pending until a channel is set.
                let channel = self.state.channel.read().await.clone();
                let Some(channel) = channel else {
                    log::warn!("No digest channel configured, skipping scheduled run");
                    return;
                };
                match self.run_pipeline().await {
                    Ok(outcome) => self.deliver_scheduled(&channel, &outcome).await,
                    Err(e) => log::error!("Scheduled digest failed: {}", e),
                }
            }
        }
    }

    async fn run_pipeline(&self) -> Result<DigestOutcome> {
        self.state.running.store(true, Ordering::SeqCst);
        let result = self.pipeline.run().await;
        self.state.running.store(false, Ordering::SeqCst);
        self.state.runs_completed.fetch_add(1, Ordering::SeqCst);
        *self.state.last_run.write().await = Some(Utc::now());
        result
    }

    async fn deliver_scheduled(&self, channel: &str, outcome: &DigestOutcome) {
        if !outcome.has_new_content() {
            log::info!("No new content, nothing to send");
            return;
        }

        let chunks = outcome.message.chunks(&self.limits);
        if let Err(e) = self.notifier.deliver(channel, &chunks).await {
            log::error!("Delivery to {} failed: {}", channel, e);
        }
    }
}

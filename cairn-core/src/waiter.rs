//! Waiter - Poll a remote resource until it converges
//!
//! Asynchronous create/update/delete operations move a remote object through
//! a series of named statuses. A [`Waiter`] repeatedly refreshes the object
//! and classifies each observed status as pending (keep polling), target
//! (done) or anything else (fail fast). Not-found is success when waiting for
//! deletion and a failure otherwise.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Durations beyond this horizon are treated as unbounded
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + duration`, saturating at [`FAR_FUTURE`]
fn after(start: Instant, duration: Duration) -> Instant {
    start + duration.min(FAR_FUTURE)
}

/// Errors returned while waiting for a resource to converge
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("{subject} not found while waiting for it to become {target} (attempts: {attempts})")]
    NotFound {
        subject: String,
        target: String,
        attempts: u32,
    },

    #[error(
        "timeout while waiting for {subject} to become {target} (last status: {}, elapsed: {elapsed:?}, attempts: {attempts})",
        last_status.as_deref().unwrap_or("none")
    )]
    Timeout {
        subject: String,
        target: String,
        last_status: Option<String>,
        elapsed: Duration,
        attempts: u32,
    },

    #[error("unexpected status '{status}' for {subject} while waiting for it to become {target}")]
    UnexpectedStatus {
        subject: String,
        status: String,
        target: String,
    },

    #[error("failed to refresh {subject}")]
    Fetch {
        subject: String,
        #[source]
        source: BoxError,
    },

    #[error("cancelled waiting for {subject} after {elapsed:?}")]
    Cancelled { subject: String, elapsed: Duration },
}

/// How a poll loop ended successfully
enum Converged<R> {
    Reached(R),
    Gone { attempts: u32 },
}

/// Status poller configured with pending and target status sets
#[derive(Debug, Clone)]
pub struct Waiter<S> {
    subject: String,
    pending: Vec<S>,
    target: Vec<S>,
    timeout: Duration,
    min_interval: Duration,
    delay: Duration,
}

impl<S> Waiter<S>
where
    S: PartialEq + fmt::Display,
{
    /// `subject` names the awaited object in diagnostics,
    /// e.g. "ElastiCache Serverless Cache (main)"
    pub fn new(subject: impl Into<String>, timeout: Duration) -> Self {
        Self {
            subject: subject.into(),
            pending: Vec::new(),
            target: Vec::new(),
            timeout,
            min_interval: Duration::ZERO,
            delay: Duration::ZERO,
        }
    }

    pub fn pending(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.pending = statuses.into_iter().collect();
        self
    }

    pub fn target(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.target = statuses.into_iter().collect();
        self
    }

    /// Lower bound on the time between two refreshes
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Time to wait before the first refresh
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait until the object reports a target status and return it.
    ///
    /// `refresh` yields `Ok(None)` when the object does not exist, which is
    /// a failure here. `cancel` aborts the wait when it completes.
    pub async fn wait_until_available<R, F, Fut, E, C>(
        &self,
        refresh: F,
        cancel: C,
    ) -> Result<R, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(R, S)>, E>>,
        E: Into<BoxError>,
        C: Future<Output = ()>,
    {
        match self.poll(refresh, cancel).await? {
            Converged::Reached(resource) => Ok(resource),
            Converged::Gone { attempts } => Err(WaitError::NotFound {
                subject: self.subject.clone(),
                target: self.describe_target(),
                attempts,
            }),
        }
    }

    /// Wait until the object no longer exists (or reports a target status).
    pub async fn wait_until_deleted<R, F, Fut, E, C>(
        &self,
        refresh: F,
        cancel: C,
    ) -> Result<(), WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(R, S)>, E>>,
        E: Into<BoxError>,
        C: Future<Output = ()>,
    {
        match self.poll(refresh, cancel).await? {
            Converged::Reached(_) | Converged::Gone { .. } => Ok(()),
        }
    }

    async fn poll<R, F, Fut, E, C>(
        &self,
        mut refresh: F,
        cancel: C,
    ) -> Result<Converged<R>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(R, S)>, E>>,
        E: Into<BoxError>,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let started = Instant::now();
        let deadline = after(started, self.timeout);
        let mut attempts: u32 = 0;
        let mut last_status: Option<String> = None;
        let mut backoff = INITIAL_BACKOFF;
        let mut pause = self.delay;

        loop {
            let wake = after(Instant::now(), pause).min(deadline);
            tokio::select! {
                biased;
                _ = &mut cancel => return Err(self.cancelled(started)),
                _ = tokio::time::sleep_until(wake) => {}
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(started, last_status, attempts));
            }

            attempts += 1;
            let observed = tokio::select! {
                biased;
                _ = &mut cancel => return Err(self.cancelled(started)),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(self.timed_out(started, last_status, attempts));
                }
                result = refresh() => result.map_err(|e| WaitError::Fetch {
                    subject: self.subject.clone(),
                    source: e.into(),
                })?,
            };

            match observed {
                None => {
                    log::debug!("{} not found (attempt {})", self.subject, attempts);
                    return Ok(Converged::Gone { attempts });
                }
                Some((resource, status)) => {
                    if self.target.contains(&status) {
                        log::debug!("{} reached {} (attempt {})", self.subject, status, attempts);
                        return Ok(Converged::Reached(resource));
                    }
                    if !self.pending.contains(&status) {
                        return Err(WaitError::UnexpectedStatus {
                            subject: self.subject.clone(),
                            status: status.to_string(),
                            target: self.describe_target(),
                        });
                    }
                    log::debug!(
                        "{} is {}, waiting for {} (attempt {})",
                        self.subject,
                        status,
                        self.describe_target(),
                        attempts
                    );
                    last_status = Some(status.to_string());
                }
            }

            pause = backoff.max(self.min_interval);
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    fn describe_target(&self) -> String {
        if self.target.is_empty() {
            return "absent".to_string();
        }
        self.target
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn cancelled(&self, started: Instant) -> WaitError {
        WaitError::Cancelled {
            subject: self.subject.clone(),
            elapsed: started.elapsed(),
        }
    }

    fn timed_out(&self, started: Instant, last_status: Option<String>, attempts: u32) -> WaitError {
        WaitError::Timeout {
            subject: self.subject.clone(),
            target: self.describe_target(),
            last_status,
            elapsed: started.elapsed(),
            attempts,
        }
    }
}

/// Cancellation signal shared by every wait a caller starts.
///
/// Cloning is cheap; all clones observe the same trigger.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a signal and the sender that triggers it (send `true`)
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Resolves once shutdown has been requested; pends forever if the
    /// sender is gone without having requested it
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Retry `op` while `retryable` accepts its error and time remains.
///
/// Used for mutating calls the API rejects transiently (e.g. a dependency is
/// still being detached). Any other outcome is returned as-is.
pub async fn retry_when<T, E, F, Fut, P>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let deadline = after(Instant::now(), timeout);
    loop {
        match op().await {
            Err(e) if retryable(&e) && after(Instant::now(), interval) <= deadline => {
                log::debug!("retrying after retryable error: {}", e);
                tokio::time::sleep(interval).await;
            }
            result => return result,
        }
    }
}

//! Bounded fan-out for stages that call external services.
//!
//! [`ExternalCallRunner::run`] sends a batch of requests to at most
//! `max_in_flight` worker threads over a crossbeam channel and waits for
//! replies until a shared deadline. Any request that errors or has not
//! answered by the deadline gets a deterministic fallback instead, so an
//! external stage always finishes in bounded time.
//!
//! Workers are detached: a call that hangs past the deadline keeps its
//! thread until it returns, but its late reply is discarded and no
//! further requests are started.
//!
//! The cap covers every batch of one runner (and its clones): a call holds
//! a permit until it actually returns, so hung calls from an earlier batch
//! keep their slots. Requests that find no free permit before the deadline
//! fall back with [`FallbackReason::Unavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use phylon_core::Diagnostic;

use crate::config::ExternalConfig;

/// Why a request received its fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// The call returned an error.
    Error(String),
    /// No reply before the deadline.
    Timeout,
    /// A worker thread could not be started.
    Unavailable(String),
}

/// Result of one external request.
#[derive(Clone, Debug, PartialEq)]
pub enum ExternalOutcome<T> {
    /// The service answered in time.
    Answered(T),
    /// The fallback was used.
    Fallback {
        /// Fallback value.
        value: T,
        /// Why.
        reason: FallbackReason,
    },
}

impl<T> ExternalOutcome<T> {
    /// The answer or the fallback.
    pub fn into_value(self) -> T {
        match self {
            Self::Answered(v) | Self::Fallback { value: v, .. } => v,
        }
    }

    /// Whether the fallback was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// A diagnostic describing the fallback, if one was used.
    pub fn diagnostic(&self, subject: &str) -> Option<Diagnostic> {
        match self {
            Self::Answered(_) => None,
            Self::Fallback { reason, .. } => {
                let message = match reason {
                    FallbackReason::Error(e) => format!("external call failed: {e}"),
                    FallbackReason::Timeout => "external call timed out".to_string(),
                    FallbackReason::Unavailable(e) => format!("no worker available: {e}"),
                };
                Some(Diagnostic::new(subject, message))
            }
        }
    }
}

// ── Permits ────────────────────────────────────────────────────────

/// Counting semaphore over a bounded channel pre-filled with tokens.
#[derive(Clone, Debug)]
struct Permits {
    release: Sender<()>,
    acquire: Receiver<()>,
}

impl Permits {
    fn new(count: usize) -> Self {
        let (release, acquire) = bounded(count);
        for _ in 0..count {
            // Capacity is exactly `count`; sending cannot fail.
            let _ = release.send(());
        }
        Self { release, acquire }
    }

    /// Wait for a token until `deadline`.
    fn acquire(&self, deadline: Instant) -> Option<Permit> {
        self.acquire.recv_deadline(deadline).ok().map(|()| Permit {
            release: self.release.clone(),
        })
    }

    fn available(&self) -> usize {
        self.acquire.len()
    }
}

/// Returns its token when dropped, including when the call panics.
struct Permit {
    release: Sender<()>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.release.send(());
    }
}

// ── Runner ─────────────────────────────────────────────────────────

/// Runs batches of external calls with a concurrency cap and a deadline.
///
/// Clones share one permit pool.
#[derive(Clone, Debug)]
pub struct ExternalCallRunner {
    max_in_flight: usize,
    timeout: Duration,
    permits: Permits,
}

impl Default for ExternalCallRunner {
    fn default() -> Self {
        Self::from_config(&ExternalConfig::default())
    }
}

impl ExternalCallRunner {
    /// Runner with explicit limits. `max_in_flight` is raised to 1.
    pub fn new(max_in_flight: usize, timeout: Duration) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            max_in_flight,
            timeout,
            permits: Permits::new(max_in_flight),
        }
    }

    /// Runner from configuration.
    pub fn from_config(config: &ExternalConfig) -> Self {
        Self::new(config.max_in_flight, Duration::from_millis(config.timeout_ms))
    }

    /// Concurrency cap.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Permits not held by a running call right now.
    pub fn idle_slots(&self) -> usize {
        self.permits.available()
    }

    /// Deadline for one batch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` on every request, returning one outcome per request in
    /// request order.
    pub fn run<Req, Resp, F, Fb>(
        &self,
        requests: Vec<Req>,
        call: F,
        fallback: Fb,
    ) -> Vec<ExternalOutcome<Resp>>
    where
        Req: Send + Sync + 'static,
        Resp: Send + 'static,
        F: Fn(&Req) -> Result<Resp, String> + Send + Sync + 'static,
        Fb: Fn(&Req) -> Resp,
    {
        let total = requests.len();
        if total == 0 {
            return Vec::new();
        }
        let deadline = Instant::now() + self.timeout;
        let requests: Arc<[Req]> = requests.into();
        let call = Arc::new(call);
        let cancelled = Arc::new(AtomicBool::new(false));
        let started: Arc<[AtomicBool]> = (0..total).map(|_| AtomicBool::new(false)).collect();

        let (job_tx, job_rx) = unbounded::<usize>();
        let (reply_tx, reply_rx) = unbounded::<(usize, Result<Resp, String>)>();
        for index in 0..total {
            // Both ends are alive here; sending cannot fail.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let mut slots: Vec<Option<ExternalOutcome<Resp>>> = (0..total).map(|_| None).collect();
        let workers = self.max_in_flight.min(total);
        let mut spawned = 0;
        let mut spawn_error = None;
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let reply_tx = reply_tx.clone();
            let requests = Arc::clone(&requests);
            let call = Arc::clone(&call);
            let cancelled = Arc::clone(&cancelled);
            let started = Arc::clone(&started);
            let permits = self.permits.clone();
            let spawned_thread = thread::Builder::new()
                .name(format!("phylon-external-{worker}"))
                .spawn(move || {
                    while let Ok(index) = job_rx.recv() {
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        let Some(permit) = permits.acquire(deadline) else {
                            break;
                        };
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        started[index].store(true, Ordering::Release);
                        let result = (*call)(&requests[index]);
                        drop(permit);
                        if reply_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            match spawned_thread {
                Ok(_) => spawned += 1,
                Err(e) => {
                    spawn_error = Some(e.to_string());
                    break;
                }
            }
        }
        drop(reply_tx);
        drop(job_rx);

        let mut received = 0;
        if spawned > 0 {
            while received < total {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match reply_rx.recv_timeout(remaining) {
                    Ok((index, result)) => {
                        slots[index] = Some(match result {
                            Ok(v) => ExternalOutcome::Answered(v),
                            Err(e) => ExternalOutcome::Fallback {
                                value: fallback(&requests[index]),
                                reason: FallbackReason::Error(e),
                            },
                        });
                        received += 1;
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        cancelled.store(true, Ordering::Release);

        let missing_reason = |index: usize| match &spawn_error {
            Some(e) if spawned == 0 => FallbackReason::Unavailable(e.clone()),
            _ if started[index].load(Ordering::Acquire) => FallbackReason::Timeout,
            _ => FallbackReason::Unavailable("no free call slot before the deadline".into()),
        };
        let missing = total - received;
        if missing > 0 {
            warn!(
                missing,
                total,
                idle_slots = self.permits.available(),
                timeout_ms = self.timeout.as_millis() as u64,
                "external calls fell back"
            );
        }
        let outcomes: Vec<ExternalOutcome<Resp>> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ExternalOutcome::Fallback {
                    value: fallback(&requests[index]),
                    reason: missing_reason(index),
                })
            })
            .collect();
        debug!(
            total,
            answered = outcomes.iter().filter(|o| !o.is_fallback()).count(),
            workers = spawned,
            "external batch finished"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn answers_keep_request_order() {
        let runner = ExternalCallRunner::new(3, Duration::from_secs(5));
        let out = runner.run(
            (0..10u64).collect(),
            |&n| {
                thread::sleep(Duration::from_millis(10 - n));
                Ok(n * 2)
            },
            |_| 0,
        );
        let values: Vec<u64> = out.into_iter().map(ExternalOutcome::into_value).collect();
        assert_eq!(values, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn errors_use_the_fallback() {
        let runner = ExternalCallRunner::new(2, Duration::from_secs(5));
        let out = runner.run(
            vec!["ok", "bad"],
            |s: &&str| {
                if *s == "bad" {
                    Err("service said no".to_string())
                } else {
                    Ok(s.len())
                }
            },
            |_| 99,
        );
        assert_eq!(out[0], ExternalOutcome::Answered(2));
        assert_eq!(
            out[1],
            ExternalOutcome::Fallback {
                value: 99,
                reason: FallbackReason::Error("service said no".into())
            }
        );
        assert!(out[1].diagnostic("narrative").is_some());
    }

    #[test]
    fn slow_calls_time_out_within_budget() {
        let runner = ExternalCallRunner::new(2, Duration::from_millis(50));
        let start = Instant::now();
        let out = runner.run(
            vec![0u64, 5_000, 5_000],
            |&ms| {
                thread::sleep(Duration::from_millis(ms));
                Ok(ms)
            },
            |_| u64::MAX,
        );
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(out[0], ExternalOutcome::Answered(0));
        assert!(out[1].is_fallback() && out[2].is_fallback());
        assert_eq!(out[2].clone().into_value(), u64::MAX);
    }

    #[test]
    fn concurrency_never_exceeds_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let runner = ExternalCallRunner::new(2, Duration::from_secs(5));
        let out = runner.run(
            (0..8).collect::<Vec<u32>>(),
            move |_| {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                f.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            },
            |_| (),
        );
        assert_eq!(out.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn hung_calls_hold_their_slot_across_batches() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = ExternalCallRunner::new(1, Duration::from_millis(20));
        let batch = |ms: u64| {
            let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
            runner.run(
                vec![ms],
                move |&ms| {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(ms));
                    f.fetch_sub(1, Ordering::SeqCst);
                    Ok(ms)
                },
                |_| 0,
            )
        };

        let first = batch(300);
        assert_eq!(
            first[0],
            ExternalOutcome::Fallback {
                value: 0,
                reason: FallbackReason::Timeout
            }
        );
        for _ in 0..2 {
            let out = batch(300);
            assert!(matches!(
                out[0],
                ExternalOutcome::Fallback {
                    reason: FallbackReason::Unavailable(_),
                    ..
                }
            ));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(runner.idle_slots(), 0);

        // Once the hung call returns its slot is free again.
        let start = Instant::now();
        while runner.idle_slots() == 0 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(batch(0)[0], ExternalOutcome::Answered(0));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_cap() {
        let runner = ExternalCallRunner::new(1, Duration::from_millis(20));
        let clone = runner.clone();
        let hung = runner.run(
            vec![()],
            |_| {
                thread::sleep(Duration::from_millis(200));
                Ok(1)
            },
            |_| 0,
        );
        assert!(hung[0].is_fallback());
        let out = clone.run(vec![()], |_| Ok(1), |_| 0);
        assert!(matches!(
            out[0],
            ExternalOutcome::Fallback {
                reason: FallbackReason::Unavailable(_),
                ..
            }
        ));
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let out = ExternalCallRunner::default().run(Vec::<u8>::new(), |_| Ok(1u8), |_| 0);
        assert!(out.is_empty());
    }
}

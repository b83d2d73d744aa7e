//! # Worker Pool Module
//!
//! Pools of worker coroutines for endpoints that need parallel request
//! processing. A single-coroutine handler serializes its requests; a pool
//! of N workers drains the same queue concurrently, which keeps one slow
//! request from delaying the rest of the endpoint's traffic.
//!
//! ## Configuration
//!
//! - `APILANE_ENDPOINT_WORKERS`: workers per pooled endpoint (default: 4)
//! - `APILANE_QUEUE_BOUND`: queue depth at which shedding kicks in (default: 1024)
//! - `APILANE_BACKPRESSURE_MODE`: `block` or `shed` (default: `block`)

use crate::dispatcher::{run_handler, HandlerRequest, HandlerResponse};
use may::coroutine;
use may::sync::{mpsc, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What to do when a pool's queue is at its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureMode {
    /// Keep queueing; the bound is advisory.
    #[default]
    Block,
    /// Reject the request immediately with 429.
    Shed,
}

impl BackpressureMode {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Some(Self::Block),
            "shed" => Some(Self::Shed),
            _ => None,
        }
    }
}

/// Sizing and backpressure settings for one pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,
    pub queue_bound: usize,
    pub mode: BackpressureMode,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_bound: 1024,
            mode: BackpressureMode::Block,
        }
    }
}

impl WorkerPoolConfig {
    /// Load pool configuration from environment variables, falling back to
    /// the defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_workers: std::env::var("APILANE_ENDPOINT_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.num_workers),
            queue_bound: std::env::var("APILANE_QUEUE_BOUND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.queue_bound),
            mode: std::env::var("APILANE_BACKPRESSURE_MODE")
                .ok()
                .and_then(|v| BackpressureMode::parse(&v))
                .unwrap_or(defaults.mode),
        }
    }
}

/// Counters exposed for monitoring a pool.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    queued: AtomicUsize,
    dispatched: AtomicU64,
    completed: AtomicU64,
    shed: AtomicU64,
}

impl PoolMetrics {
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn shed(&self) -> u64 {
        self.shed.load(Ordering::Relaxed)
    }
}

/// A pool of worker coroutines sharing one request queue.
pub struct WorkerPool {
    name: String,
    tx: mpsc::Sender<HandlerRequest>,
    config: WorkerPoolConfig,
    metrics: Arc<PoolMetrics>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` worker coroutines draining a shared queue.
    ///
    /// # Safety
    ///
    /// Spawning `may` coroutines is unsafe in the `may` runtime; the caller
    /// must ensure the runtime is initialized first.
    pub(crate) unsafe fn spawn<F>(name: String, config: WorkerPoolConfig, handler_fn: F) -> Self
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let rx = Arc::new(Mutex::new(rx));
        let metrics = Arc::new(PoolMetrics::default());

        for worker_idx in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let metrics = Arc::clone(&metrics);
            let handler_fn = handler_fn.clone();
            let pool_name = name.clone();
            let spawn_result = coroutine::Builder::new()
                .stack_size(may::config().get_stack_size())
                .spawn(move || {
                    debug!(pool = %pool_name, worker = worker_idx, "Worker started");
                    loop {
                        let msg = {
                            let guard = match rx.lock() {
                                Ok(g) => g,
                                Err(_) => break,
                            };
                            guard.recv()
                        };
                        let req = match msg {
                            Ok(req) => req,
                            Err(_) => break,
                        };
                        metrics.queued.fetch_sub(1, Ordering::Relaxed);
                        run_handler(&handler_fn, req);
                        metrics.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(pool = %pool_name, worker = worker_idx, "Worker exiting");
                });
            if let Err(e) = spawn_result {
                error!(pool = %name, worker = worker_idx, error = %e, "Failed to spawn worker");
            }
        }

        info!(
            pool = %name,
            workers = config.num_workers,
            queue_bound = config.queue_bound,
            mode = ?config.mode,
            "Worker pool started"
        );

        Self {
            name,
            tx,
            config,
            metrics,
        }
    }

    /// Queue a request for the pool, or return the backpressure response the
    /// caller should send instead.
    pub(crate) fn dispatch(&self, req: HandlerRequest) -> Result<(), HandlerResponse> {
        if self.config.mode == BackpressureMode::Shed
            && self.metrics.queue_depth() >= self.config.queue_bound
        {
            self.metrics.shed.fetch_add(1, Ordering::Relaxed);
            return Err(HandlerResponse::error(
                429,
                "too_many_requests",
                "endpoint queue is full",
            ));
        }
        self.metrics.queued.fetch_add(1, Ordering::Relaxed);
        self.metrics.dispatched.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(req).is_err() {
            self.metrics.queued.fetch_sub(1, Ordering::Relaxed);
            error!(pool = %self.name, "All workers exited, queue closed");
            return Err(HandlerResponse::error(
                503,
                "handler_unavailable",
                "endpoint is not responding",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_mode_parses_known_values() {
        assert_eq!(BackpressureMode::parse("block"), Some(BackpressureMode::Block));
        assert_eq!(BackpressureMode::parse("SHED"), Some(BackpressureMode::Shed));
        assert_eq!(BackpressureMode::parse("drop"), None);
    }
}

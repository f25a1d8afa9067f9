//! Scheduler for bounding concurrent page fetches
//!
//! This module handles:
//! - A FIFO queue of pages waiting to be fetched (discovery order)
//! - Global concurrency limiting via a semaphore
//! - An optional minimum spacing between fetch starts (politeness delay)
//! - Collecting finished fetch tasks exactly once

use crate::crawler::fetcher::PageRequest;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

/// Scheduler manages the pending queue and the in-flight task set
///
/// The scheduler guarantees:
/// - At most `max_concurrency` tasks are running at once
/// - Pending requests are started in the order they were enqueued
/// - Every started task is reported by [`Scheduler::next_completed`] exactly once
pub struct Scheduler<T> {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Requests waiting for a free slot
    pending: VecDeque<PageRequest>,

    /// Tasks currently running
    in_flight: JoinSet<T>,

    /// Minimum time between two task starts
    min_interval: Duration,

    /// Earliest instant the next task may start
    next_slot: Option<Instant>,

    /// Once closed, nothing new is queued or started
    closed: bool,

    max_concurrency: usize,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrency` - Maximum number of tasks in flight (at least 1)
    /// * `min_interval` - Minimum spacing between task starts; zero disables spacing
    pub fn new(max_concurrency: usize, min_interval: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            pending: VecDeque::new(),
            in_flight: JoinSet::new(),
            min_interval,
            next_slot: None,
            closed: false,
            max_concurrency,
        }
    }

    /// Adds a request to the back of the pending queue
    ///
    /// Returns false if the scheduler is closed and the request was not queued.
    pub fn enqueue(&mut self, request: PageRequest) -> bool {
        if self.closed {
            return false;
        }
        self.pending.push_back(request);
        true
    }

    /// Starts as many pending requests as free slots allow
    ///
    /// `start` turns a request into the future that performs it. Each spawned task
    /// holds a semaphore permit until it finishes.
    ///
    /// # Returns
    ///
    /// The number of tasks started by this call
    pub fn admit<F, Fut>(&mut self, mut start: F) -> usize
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        if self.closed {
            return 0;
        }

        let mut started = 0;
        while !self.pending.is_empty() {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let Some(request) = self.pending.pop_front() else {
                break;
            };

            let start_at = self.reserve_slot();
            tracing::trace!("Admitting {} (page {})", request.url, request.page_index);
            let task = start(request);

            self.in_flight.spawn(async move {
                let _permit = permit;
                if let Some(at) = start_at {
                    tokio::time::sleep_until(at).await;
                }
                task.await
            });
            started += 1;
        }

        started
    }

    /// Reserves the next start slot when a politeness interval is configured
    fn reserve_slot(&mut self) -> Option<Instant> {
        if self.min_interval.is_zero() {
            return None;
        }

        let now = Instant::now();
        let at = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        self.next_slot = Some(at + self.min_interval);
        Some(at)
    }

    /// Waits for the next in-flight task to finish
    ///
    /// # Returns
    ///
    /// * `Some(Ok(T))` - A task finished
    /// * `Some(Err(JoinError))` - A task panicked or was aborted
    /// * `None` - Nothing is in flight
    pub async fn next_completed(&mut self) -> Option<Result<T, JoinError>> {
        self.in_flight.join_next().await
    }

    /// Stops admitting work and hands back everything still pending
    ///
    /// In-flight tasks keep running and must still be collected.
    pub fn close(&mut self) -> Vec<PageRequest> {
        self.closed = true;
        self.pending.drain(..).collect()
    }

    /// Closes the scheduler and aborts every in-flight task
    ///
    /// # Returns
    ///
    /// The number of requests that were pending or running
    pub fn abort_all(&mut self) -> usize {
        let pending = self.close().len();
        let running = self.in_flight.len();
        self.in_flight.abort_all();
        self.in_flight.detach_all();
        pending + running
    }

    /// Returns the number of tasks currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns the number of requests waiting for a slot
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when nothing is pending or running
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    /// Returns whether the scheduler has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

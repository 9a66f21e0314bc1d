//! Deadline timer and the race between a socket operation and its deadline.
//!
//! One `DeadlineTimer` guards one attempt. It is armed once and may span
//! several socket operations (the handshake's write and read share it). The
//! timer is never spawned onto another task: `race` polls it next to the I/O
//! future, so expiry and I/O completion are observed on the same execution
//! context as the socket. When the timer wins, the I/O future is dropped and
//! the caller closes the socket.

use std::future::{self, Future};
use std::io;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::{self, Instant};

/// Lifecycle of a deadline timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not armed yet
    Idle,
    /// Counting down to its deadline
    Armed,
    /// Cancelled before the deadline was reached
    Cancelled,
    /// Deadline reached while an operation was pending
    Expired,
}

/// Arm/cancel/expire timer used to bound an operation.
#[derive(Debug)]
pub struct DeadlineTimer {
    deadline: Option<Instant>,
    timeout: Duration,
    state: TimerState,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self {
            deadline: None,
            timeout: Duration::ZERO,
            state: TimerState::Idle,
        }
    }

    /// Start counting down. Re-arming replaces the previous deadline.
    ///
    /// A timeout too large to represent as an instant arms the timer with no
    /// deadline; it then never expires.
    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Instant::now().checked_add(timeout);
        self.timeout = timeout;
        self.state = TimerState::Armed;
        trace!("timer armed for {:?}", timeout);
    }

    /// Cancel a pending deadline. Returns false if nothing was pending.
    pub fn cancel(&mut self) -> bool {
        if self.state != TimerState::Armed {
            return false;
        }
        self.state = TimerState::Cancelled;
        trace!("timer cancelled");
        true
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == TimerState::Armed
    }

    /// The duration the timer was last armed with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `None` when idle or armed without a reachable deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes when an armed timer reaches its deadline.
    ///
    /// Never completes for an idle or cancelled timer, or one armed without a
    /// deadline, so it can sit in a `select!` without winning.
    pub async fn expired(&self) {
        match (self.state, self.deadline) {
            (TimerState::Armed, Some(deadline)) => time::sleep_until(deadline).await,
            (TimerState::Expired, _) => {}
            _ => future::pending::<()>().await,
        }
    }
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of racing one socket operation against a deadline.
#[derive(Debug)]
pub(crate) enum Race<T> {
    /// The operation finished first, successfully or not
    Completed(io::Result<T>),
    /// The deadline passed first and the operation was dropped
    Aborted,
}

impl<T> Race<T> {
    /// Fold in the socket state observed after resuming.
    ///
    /// An operation that reports success on a socket which is no longer open
    /// lost the race after all.
    pub(crate) fn settle(self, socket_open: bool) -> Race<T> {
        match self {
            Race::Completed(Ok(_)) if !socket_open => Race::Aborted,
            other => other,
        }
    }
}

/// Poll `op` and the timer together, preferring a finished operation.
pub(crate) async fn race<T, F>(op: F, timer: &mut DeadlineTimer) -> Race<T>
where
    F: Future<Output = io::Result<T>>,
{
    let outcome = tokio::select! {
        biased;
        res = op => Race::Completed(res),
        _ = timer.expired() => Race::Aborted,
    };

    if matches!(outcome, Race::Aborted) {
        timer.state = TimerState::Expired;
        debug!("deadline of {:?} reached, aborting operation", timer.timeout);
    }
    outcome
}

/// Bound an arbitrary future by `limit`, if any.
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

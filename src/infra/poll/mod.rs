//! Bounded busy-wait polling.
//!
//! Every wait on a hardware status bit goes through [`BoundedPoll::until`]. A
//! poll ends in exactly one of four ways:
//!
//! * the status reports readiness → `Ok(value)`;
//! * the status reports an explicit error → [`PollError::Fault`];
//! * the caller's [`Cancel`] signal fires → [`PollError::Cancelled`];
//! * the [`PollBudget`] runs out (iterations or wall-clock) → [`PollError::Exhausted`].
//!
//! There is no unbounded variant.
use core::task::Poll;

use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embassy_time::{Duration, Instant};

use crate::core::{HardwareCode, DEFAULT_POLL_LIMIT};
use crate::error::{ConfigurationError, PollError};

//==================================================================================POLL_BUDGET
/// Maximum effort spent in one wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollBudget {
    /// Hard cap on status reads.
    pub max_polls: u32,
    /// Optional wall-clock limit, measured with the supplied [`PollClock`].
    pub timeout: Option<Duration>,
}

impl PollBudget {
    /// Budget limited by iteration count only.
    pub const fn polls(max_polls: u32) -> Self {
        Self {
            max_polls,
            timeout: None,
        }
    }

    /// Adds a wall-clock limit on top of the iteration cap.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_polls == 0 {
            return Err(ConfigurationError::EmptyPollBudget);
        }
        Ok(())
    }

    /// [`validate`](Self::validate), and a wall-clock limit needs a clock that
    /// actually measures time.
    pub fn validate_for(&self, clock: &dyn PollClock) -> Result<(), ConfigurationError> {
        self.validate()?;
        if self.timeout.is_some() && !clock.tracks_time() {
            return Err(ConfigurationError::TimeoutWithoutClock);
        }
        Ok(())
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::polls(DEFAULT_POLL_LIMIT)
    }
}

//==================================================================================POLL_CLOCK
/// Time source used to enforce [`PollBudget::timeout`].
pub trait PollClock: core::fmt::Debug {
    fn now(&self) -> Instant;

    /// False for clocks that never advance; a budget timeout is then meaningless.
    fn tracks_time(&self) -> bool {
        true
    }
}

/// Clock that never advances: only the iteration cap applies.
#[derive(Clone, Copy, Debug, Default)]
pub struct IterationsOnly;

impl PollClock for IterationsOnly {
    fn now(&self) -> Instant {
        Instant::from_ticks(0)
    }

    fn tracks_time(&self) -> bool {
        false
    }
}

/// Clock backed by the linked `embassy-time` driver.
#[cfg(feature = "time-driver")]
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "time-driver")]
impl PollClock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock used by handles unless the configuration names another one:
/// [`EmbassyClock`] with the `time-driver` feature, [`IterationsOnly`] otherwise.
#[cfg(feature = "time-driver")]
pub fn default_clock() -> &'static dyn PollClock {
    &EmbassyClock
}

/// Clock used by handles unless the configuration names another one.
#[cfg(not(feature = "time-driver"))]
pub fn default_clock() -> &'static dyn PollClock {
    &IterationsOnly
}

//==================================================================================CANCEL
/// Cancellation signal checked before every poll iteration.
pub trait Cancel {
    fn is_cancelled(&self) -> bool;
}

/// Never cancels.
impl Cancel for () {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[cfg(target_has_atomic = "8")]
impl Cancel for core::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(core::sync::atomic::Ordering::Acquire)
    }
}

/// Cancelled once the signal has been raised (and not yet consumed).
impl<M: RawMutex> Cancel for Signal<M, ()> {
    fn is_cancelled(&self) -> bool {
        self.signaled()
    }
}

impl<C: Cancel + ?Sized> Cancel for &C {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

//==================================================================================POLL_CONTEXT
/// Clock and cancellation signal passed into a blocking call.
///
/// Without a clock of its own the context falls back to the clock of the
/// handle doing the wait.
#[derive(Clone, Copy)]
pub struct PollContext<'a> {
    pub clock: Option<&'a dyn PollClock>,
    pub cancel: &'a dyn Cancel,
}

impl PollContext<'static> {
    /// Handle clock, never cancelled.
    pub fn none() -> Self {
        Self {
            clock: None,
            cancel: &(),
        }
    }
}

impl<'a> PollContext<'a> {
    pub fn new(clock: &'a dyn PollClock, cancel: &'a dyn Cancel) -> Self {
        Self {
            clock: Some(clock),
            cancel,
        }
    }

    /// Same clock, different cancellation signal.
    pub fn with_cancel(self, cancel: &'a dyn Cancel) -> Self {
        Self {
            clock: self.clock,
            cancel,
        }
    }

    /// Use `clock` unless this context already carries one.
    pub fn or_clock(self, clock: &'a dyn PollClock) -> Self {
        Self {
            clock: Some(self.clock.unwrap_or(clock)),
            cancel: self.cancel,
        }
    }

    /// Start a bounded wait with this context. A context without a clock only
    /// counts iterations.
    pub fn poll(&self, budget: PollBudget) -> BoundedPoll<'a> {
        let clock: &'a dyn PollClock = match self.clock {
            Some(clock) => clock,
            None => &IterationsOnly,
        };
        BoundedPoll::new(budget, clock, self.cancel)
    }
}

//==================================================================================BOUNDED_POLL
/// One bounded wait: a budget, a clock and a cancellation signal.
pub struct BoundedPoll<'a> {
    budget: PollBudget,
    clock: &'a dyn PollClock,
    cancel: &'a dyn Cancel,
}

impl<'a> BoundedPoll<'a> {
    pub fn new(budget: PollBudget, clock: &'a dyn PollClock, cancel: &'a dyn Cancel) -> Self {
        Self {
            budget,
            clock,
            cancel,
        }
    }

    /// Repeatedly evaluate `status` until it is ready, faults, or the budget ends.
    ///
    /// `status` receives the 1-based attempt number and returns
    /// `Poll::Pending` while the hardware is busy, `Poll::Ready(Ok(_))` when the
    /// awaited condition holds, or `Poll::Ready(Err(code))` for an explicit
    /// error status.
    pub fn until<T, F>(&self, mut status: F) -> Result<T, PollError>
    where
        F: FnMut(u32) -> Poll<Result<T, HardwareCode>>,
    {
        let start = self.clock.now();
        let deadline = self.budget.timeout.and_then(|t| start.checked_add(t));

        for attempt in 1..=self.budget.max_polls {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { polls: attempt - 1 });
            }

            match status(attempt) {
                Poll::Ready(Ok(value)) => return Ok(value),
                Poll::Ready(Err(code)) => {
                    return Err(PollError::Fault {
                        code,
                        polls: attempt,
                    })
                }
                Poll::Pending => {}
            }

            if let Some(deadline) = deadline {
                if self.clock.now() >= deadline {
                    return Err(PollError::Exhausted { polls: attempt });
                }
            }
            core::hint::spin_loop();
        }

        Err(PollError::Exhausted {
            polls: self.budget.max_polls,
        })
    }
}

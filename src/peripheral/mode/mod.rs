//! Mode controller: drives a peripheral through
//! `Reset → Configuration → Operational`, confirming each step by polling the
//! status register within the handle's [`PollBudget`](crate::infra::poll::PollBudget).
//!
//! | from \ to      | Reset | Configuration | Operational          |
//! |----------------|-------|---------------|----------------------|
//! | Reset          | yes   | yes           | no                   |
//! | Configuration  | yes   | yes           | timing applied       |
//! | Operational    | yes   | yes           | yes                  |
//! | Faulted        | yes   | yes           | timing applied       |
//!
//! `Faulted` is never requested; it is latched when a timing profile is
//! rejected or a transition exhausts its budget.
use core::task::Poll;

use crate::core::{Mode, Operation};
use crate::error::{ConfigurationError, HarnessError, PollError};
use crate::infra::poll::PollContext;
use crate::peripheral::handle::PeripheralHandle;
use crate::peripheral::traits::peripheral::Peripheral;
use crate::timing::TimingProfile;

//==================================================================================STALL_POLICY
/// What the controller does while a requested mode has not been reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StallPolicy {
    /// Keep polling; the request is issued once.
    Wait,
    /// Re-issue the mode request every `every` unsuccessful polls.
    Reissue { every: u32 },
}

impl StallPolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match *self {
            StallPolicy::Reissue { every: 0 } => Err(ConfigurationError::OutOfRange {
                field: "reissue interval",
                value: 0,
                min: 1,
                max: u32::MAX,
            }),
            _ => Ok(()),
        }
    }

    fn reissue_at(&self, attempt: u32) -> bool {
        match *self {
            StallPolicy::Wait => false,
            StallPolicy::Reissue { every } => every != 0 && attempt % every == 0,
        }
    }
}

//==================================================================================MODE_CONTROLLER
impl<D: Peripheral> PeripheralHandle<D> {
    /// Controller mode: the last observed hardware mode, or `Faulted` once latched.
    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Raw mode read at the most recent status poll.
    pub fn last_observed_mode(&self) -> Mode {
        self.observed
    }

    /// Read the status register now. A latched fault is kept until a new
    /// transition succeeds.
    pub fn observe_mode(&mut self) -> Mode {
        self.observed = self.driver.mode();
        if self.mode != Mode::Faulted {
            self.mode = self.observed;
        }
        self.observed
    }

    /// Request `target` and block until the hardware confirms it or the budget ends.
    pub fn request_mode(&mut self, target: Mode) -> Result<Mode, HarnessError> {
        self.request_mode_with(target, PollContext::none())
    }

    /// [`request_mode`](Self::request_mode) with an explicit clock and cancellation signal.
    pub fn request_mode_with(
        &mut self,
        target: Mode,
        ctx: PollContext<'_>,
    ) -> Result<Mode, HarnessError> {
        let peripheral = self.config.id;
        self.check_transition(target)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("{}: requesting {} (from {})", peripheral, target, self.mode);

        self.driver.request_mode(target);

        let stall = self.stall;
        let poll = self.poll(ctx);
        let driver = &mut self.driver;
        let mut observed = self.observed;
        let result = poll.until(|attempt| {
            if let Some(code) = driver.error_status() {
                return Poll::Ready(Err(code));
            }
            observed = driver.mode();
            if observed == target {
                return Poll::Ready(Ok(()));
            }
            if stall.reissue_at(attempt) {
                #[cfg(feature = "defmt")]
                defmt::trace!("{}: re-issuing {} after {} polls", peripheral, target, attempt);
                driver.request_mode(target);
            }
            Poll::Pending
        });
        self.observed = observed;

        match result {
            Ok(()) => {
                self.mode = target;
                if target == Mode::Reset {
                    // A controller reset clears the timing registers.
                    self.timing = None;
                }
                #[cfg(feature = "defmt")]
                defmt::info!("{}: entered {}", peripheral, target);
                Ok(target)
            }
            Err(PollError::Exhausted { polls }) => {
                self.mode = Mode::Faulted;
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "{}: {} not reached after {} polls (observed {})",
                    peripheral,
                    target,
                    polls,
                    observed
                );
                Err(HarnessError::ModeTransitionTimeout {
                    peripheral,
                    target,
                    observed,
                    polls,
                })
            }
            Err(PollError::Cancelled { polls }) => {
                if self.mode != Mode::Faulted {
                    self.mode = observed;
                }
                Err(HarnessError::Cancelled {
                    peripheral,
                    operation: Operation::ModeChange,
                    polls,
                })
            }
            Err(PollError::Fault { code, .. }) => {
                self.mode = Mode::Faulted;
                #[cfg(feature = "defmt")]
                defmt::error!("{}: fault {} while entering {}", peripheral, code, target);
                Err(HarnessError::Hardware {
                    peripheral,
                    operation: Operation::ModeChange,
                    code,
                })
            }
        }
    }

    /// Validate and write a timing profile. Requires Configuration mode.
    ///
    /// A profile failing validation is never written; the controller latches
    /// `Faulted` and forgets any previously applied profile.
    pub fn apply_timing(&mut self, timing: D::Timing) -> Result<(), HarnessError> {
        let peripheral = self.config.id;
        if self.mode != Mode::Configuration {
            return Err(HarnessError::Configuration {
                peripheral,
                reason: ConfigurationError::NotInConfiguration { mode: self.mode },
            });
        }

        let written = timing.validate().and_then(|()| {
            self.driver
                .write_timing(&timing)
                .map_err(|code| ConfigurationError::Rejected { code })
        });
        if let Err(reason) = written {
            self.mode = Mode::Faulted;
            self.timing = None;
            #[cfg(feature = "defmt")]
            defmt::error!("{}: timing rejected: {}", peripheral, reason);
            return Err(HarnessError::Configuration { peripheral, reason });
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("{}: timing applied", peripheral);
        self.timing = Some(timing);
        Ok(())
    }

    /// Configuration → timing → Operational in one call.
    pub fn bring_up(&mut self, timing: D::Timing) -> Result<(), HarnessError> {
        self.bring_up_with(timing, PollContext::none())
    }

    pub fn bring_up_with(
        &mut self,
        timing: D::Timing,
        ctx: PollContext<'_>,
    ) -> Result<(), HarnessError> {
        self.request_mode_with(Mode::Configuration, ctx)?;
        self.apply_timing(timing)?;
        self.request_mode_with(Mode::Operational, ctx)?;
        Ok(())
    }

    fn check_transition(&self, target: Mode) -> Result<(), HarnessError> {
        let peripheral = self.config.id;
        let invalid = HarnessError::InvalidTransition {
            peripheral,
            from: self.mode,
            to: target,
        };
        match (self.mode, target) {
            (_, Mode::Faulted) | (Mode::Reset, Mode::Operational) => Err(invalid),
            (_, Mode::Operational) if self.timing.is_none() => Err(HarnessError::Configuration {
                peripheral,
                reason: ConfigurationError::TimingNotApplied,
            }),
            _ => Ok(()),
        }
    }
}

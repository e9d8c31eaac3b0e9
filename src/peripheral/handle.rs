//! `PeripheralHandle`: exclusive owner of one driver instance and of its
//! configuration state (mode, applied timing, poll budget and the clock that
//! measures it). Transfer buffers are never stored here; they are borrowed per
//! call.
use crate::config::PeripheralConfig;
use crate::core::{Mode, Operation, PeripheralId};
use crate::error::HarnessError;
use crate::infra::poll::{default_clock, BoundedPoll, PollBudget, PollClock, PollContext};
use crate::peripheral::mode::StallPolicy;
use crate::peripheral::traits::peripheral::Peripheral;

/// One handle per physical peripheral. The driver is moved in, so no second
/// handle can alias the same registers.
pub struct PeripheralHandle<D: Peripheral> {
    pub(crate) driver: D,
    pub(crate) config: PeripheralConfig,
    /// Controller state: last observed mode, or `Faulted` once latched.
    pub(crate) mode: Mode,
    /// Raw mode read at the last status poll.
    pub(crate) observed: Mode,
    pub(crate) timing: Option<D::Timing>,
    pub(crate) budget: PollBudget,
    /// Measures `budget.timeout` for waits whose context brings no clock.
    pub(crate) clock: &'static dyn PollClock,
    pub(crate) stall: StallPolicy,
}

impl<D: Peripheral> PeripheralHandle<D> {
    /// Bind `driver` to the instance described by `config`, timing waits with
    /// [`default_clock`].
    pub fn initialize(
        driver: D,
        config: PeripheralConfig,
        budget: PollBudget,
        stall: StallPolicy,
    ) -> Result<Self, HarnessError> {
        Self::initialize_with_clock(driver, config, budget, stall, default_clock())
    }

    /// Bind `driver` with an explicit poll clock.
    ///
    /// Rejects an empty poll budget, or a timeout `clock` cannot measure,
    /// before touching the driver.
    pub fn initialize_with_clock(
        mut driver: D,
        config: PeripheralConfig,
        budget: PollBudget,
        stall: StallPolicy,
        clock: &'static dyn PollClock,
    ) -> Result<Self, HarnessError> {
        let configuration = |reason| HarnessError::Configuration {
            peripheral: config.id,
            reason,
        };
        budget.validate_for(clock).map_err(configuration)?;
        stall.validate().map_err(configuration)?;

        driver
            .initialize(&config)
            .map_err(|code| HarnessError::Hardware {
                peripheral: config.id,
                operation: Operation::Initialize,
                code,
            })?;
        let observed = driver.mode();

        #[cfg(feature = "defmt")]
        defmt::info!(
            "{} initialized at {:#x}, mode {}",
            config.id,
            config.base_address,
            observed
        );

        Ok(Self {
            driver,
            config,
            mode: observed,
            observed,
            timing: None,
            budget,
            clock,
            stall,
        })
    }

    pub fn id(&self) -> PeripheralId {
        self.config.id
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    /// Timing profile currently applied, if any.
    pub fn timing(&self) -> Option<&D::Timing> {
        self.timing.as_ref()
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Replace the budget used by subsequent waits.
    pub fn set_budget(&mut self, budget: PollBudget) -> Result<(), HarnessError> {
        budget
            .validate_for(self.clock)
            .map_err(|reason| HarnessError::Configuration {
                peripheral: self.config.id,
                reason,
            })?;
        self.budget = budget;
        Ok(())
    }

    /// Replace the clock measuring the budget timeout.
    pub fn set_clock(&mut self, clock: &'static dyn PollClock) -> Result<(), HarnessError> {
        self.budget
            .validate_for(clock)
            .map_err(|reason| HarnessError::Configuration {
                peripheral: self.config.id,
                reason,
            })?;
        self.clock = clock;
        Ok(())
    }

    /// Bounded wait under this handle's budget; `ctx` may override the clock.
    pub(crate) fn poll<'a>(&self, ctx: PollContext<'a>) -> BoundedPoll<'a> {
        ctx.or_clock(self.clock).poll(self.budget)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct register access, bypassing the state machine.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Release the driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    pub(crate) fn ensure_operational(&self, operation: Operation) -> Result<(), HarnessError> {
        if self.mode != Mode::Operational {
            return Err(HarnessError::NotOperational {
                peripheral: self.config.id,
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }
}

//! Operations common to every polled peripheral.
use crate::config::PeripheralConfig;
use crate::core::{HardwareCode, Mode};
use crate::timing::TimingProfile;

/// Register access shared by bus and storage controllers.
pub trait Peripheral {
    /// Timing profile written during the configuration phase.
    type Timing: TimingProfile;

    /// Bind the driver to the configured instance and reset it.
    fn initialize(&mut self, config: &PeripheralConfig) -> Result<(), HardwareCode>;

    /// Ask the hardware to enter `mode`. Asynchronous: completion is observed
    /// through [`Peripheral::mode`].
    fn request_mode(&mut self, mode: Mode);

    /// Mode currently reported by the status register.
    fn mode(&mut self) -> Mode;

    /// Write the timing registers. Only valid in Configuration mode.
    fn write_timing(&mut self, timing: &Self::Timing) -> Result<(), HardwareCode>;

    /// Latched error status, if the controller reports one.
    fn error_status(&mut self) -> Option<HardwareCode>;
}

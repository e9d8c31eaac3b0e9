//! Shared vocabulary between the mode controller, the transfer engines and the
//! verifier: peripheral identity, operating modes, hardware status codes and the
//! tagged `TransferOutcome` handed back to callers.
use crate::error::HarnessError;

//==================================================================================CONSTANTS
/// Classic CAN payload capacity in bytes.
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Frame storage in 32-bit words: identifier, length code and two data words.
pub const FRAME_WORDS: usize = 4;

/// Default storage block size (bytes).
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Size of the eMMC extended CSD register (bytes).
pub const EXT_CSD_SIZE: usize = 512;

/// Default iteration cap applied to every bounded poll.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

//==================================================================================MODE
/// Operating state of a peripheral, as reported by its status interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Power-on state, before any configuration request.
    Reset,
    /// Timing registers are writable; no traffic.
    Configuration,
    /// Normal traffic (CAN normal/loopback, eMMC transfer state).
    Operational,
    /// A configuration was rejected or a transition stalled.
    Faulted,
}

//==================================================================================IDENTITY
/// Kind of peripheral bound to a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralKind {
    /// Frame-oriented bus controller.
    Can,
    /// Block-oriented storage controller (eMMC/SD).
    Storage,
}

/// Identity of one physical peripheral instance. Copied into every error so a
/// failure can be traced back to its device without extra instrumentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId {
    pub kind: PeripheralKind,
    pub device_id: u16,
}

impl PeripheralId {
    pub const fn can(device_id: u16) -> Self {
        Self {
            kind: PeripheralKind::Can,
            device_id,
        }
    }

    pub const fn storage(device_id: u16) -> Self {
        Self {
            kind: PeripheralKind::Storage,
            device_id,
        }
    }
}

impl core::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            PeripheralKind::Can => write!(f, "can{}", self.device_id),
            PeripheralKind::Storage => write!(f, "mmc{}", self.device_id),
        }
    }
}

/// Operation during which an error was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Initialize,
    ModeChange,
    ApplyTiming,
    Send,
    Receive,
    WriteBlocks,
    ReadBlocks,
    ReadExtCsd,
}

//==================================================================================HARDWARE_CODE
/// Driver-specific status code reported by the register layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareCode(pub u32);

impl core::fmt::Display for HardwareCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

//==================================================================================TRANSFER_OUTCOME
/// Tagged result of a transfer or verification, handed to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use = "a transfer outcome must be inspected"]
pub enum TransferOutcome {
    /// Transfer completed; number of payload bytes moved.
    Success(usize),
    /// A bounded poll ran out of budget or was cancelled.
    Timeout,
    /// The peripheral reported an explicit fault status.
    HardwareError(HardwareCode),
    /// First differing byte between expected and actual data.
    IntegrityMismatch { index: usize, expected: u8, actual: u8 },
    /// Data matched as far as it went, but the byte counts differ.
    LengthMismatch { expected: usize, actual: usize },
    /// The call was rejected before any transfer (bad argument or configuration).
    Rejected,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }
}

impl From<Result<usize, HarnessError>> for TransferOutcome {
    fn from(result: Result<usize, HarnessError>) -> Self {
        match result {
            Ok(bytes) => TransferOutcome::Success(bytes),
            Err(err) => TransferOutcome::from(&err),
        }
    }
}

impl From<&HarnessError> for TransferOutcome {
    fn from(err: &HarnessError) -> Self {
        match *err {
            HarnessError::ModeTransitionTimeout { .. }
            | HarnessError::TransferTimeout { .. }
            | HarnessError::Cancelled { .. } => TransferOutcome::Timeout,
            HarnessError::Hardware { code, .. } => TransferOutcome::HardwareError(code),
            HarnessError::IntegrityMismatch {
                index,
                expected,
                actual,
            } => TransferOutcome::IntegrityMismatch {
                index,
                expected,
                actual,
            },
            HarnessError::LengthMismatch { expected, actual } => {
                TransferOutcome::LengthMismatch { expected, actual }
            }
            HarnessError::Configuration { .. }
            | HarnessError::InvalidArgument { .. }
            | HarnessError::InvalidTransition { .. }
            | HarnessError::NotOperational { .. } => TransferOutcome::Rejected,
        }
    }
}

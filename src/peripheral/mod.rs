//! Peripheral side of the harness: the register-level driver contract, the
//! per-device handle with its mode state machine, and the two transfer engines
//! (frame-oriented CAN, block-oriented storage).

pub mod can;
pub mod frame;
pub mod handle;
pub mod mode;
pub mod storage;
pub mod traits;

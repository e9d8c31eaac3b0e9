//! Register primitives of a frame-oriented bus controller.
use crate::core::HardwareCode;
use crate::peripheral::frame::Frame;
use crate::peripheral::traits::peripheral::Peripheral;
use crate::timing::bit_timing::BitTiming;

/// FIFO access of a CAN controller.
pub trait FrameRegisters: Peripheral<Timing = BitTiming> {
    /// TX FIFO cannot take another frame.
    fn is_tx_full(&mut self) -> bool;

    /// RX FIFO holds no frame.
    fn is_rx_empty(&mut self) -> bool;

    /// Push one frame into the TX FIFO.
    fn send_frame(&mut self, frame: &Frame) -> Result<(), HardwareCode>;

    /// Pop one frame from the RX FIFO into `frame`.
    fn recv_frame(&mut self, frame: &mut Frame) -> Result<(), HardwareCode>;
}

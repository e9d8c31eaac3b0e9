//! Frame transfer engine: one blocking send or receive per call, each wait
//! bounded by the handle's poll budget.
//!
//! Frames are caller-owned. `send` borrows the outgoing frame for the call,
//! `receive` writes into a caller-supplied one; nothing is kept between calls.
use core::task::Poll;

use crate::core::Operation;
use crate::error::HarnessError;
use crate::infra::poll::PollContext;
use crate::peripheral::frame::Frame;
use crate::peripheral::handle::PeripheralHandle;
use crate::peripheral::traits::frame_registers::FrameRegisters;
use crate::timing::bit_timing::BitTiming;
use crate::verify::{verify_frame, FrameMask};

//==================================================================================FRAME_ENGINE
pub struct FrameEngine<D: FrameRegisters> {
    handle: PeripheralHandle<D>,
}

impl<D: FrameRegisters> FrameEngine<D> {
    pub fn new(handle: PeripheralHandle<D>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PeripheralHandle<D> {
        &self.handle
    }

    /// Mode control and driver access.
    pub fn handle_mut(&mut self) -> &mut PeripheralHandle<D> {
        &mut self.handle
    }

    pub fn into_handle(self) -> PeripheralHandle<D> {
        self.handle
    }

    /// Configuration → bit timing → Operational.
    pub fn configure(&mut self, timing: BitTiming) -> Result<(), HarnessError> {
        self.handle.bring_up(timing)
    }

    pub fn configure_with(
        &mut self,
        timing: BitTiming,
        ctx: PollContext<'_>,
    ) -> Result<(), HarnessError> {
        self.handle.bring_up_with(timing, ctx)
    }

    /// Queue `frame` for transmission. Returns the payload length once the
    /// controller accepted it.
    pub fn send(&mut self, frame: &Frame) -> Result<usize, HarnessError> {
        self.send_with(frame, PollContext::none())
    }

    pub fn send_with(&mut self, frame: &Frame, ctx: PollContext<'_>) -> Result<usize, HarnessError> {
        let peripheral = self.handle.id();
        self.handle.ensure_operational(Operation::Send)?;

        let poll = self.handle.poll(ctx);
        let driver = &mut self.handle.driver;
        poll.until(|_| match driver.error_status() {
                Some(code) => Poll::Ready(Err(code)),
                None if driver.is_tx_full() => Poll::Pending,
                None => Poll::Ready(Ok(())),
            })
            .map_err(|err| {
                #[cfg(feature = "defmt")]
                defmt::warn!("{}: TX FIFO wait ended: {}", peripheral, err);
                HarnessError::from_poll(peripheral, Operation::Send, err)
            })?;

        driver
            .send_frame(frame)
            .map_err(|code| HarnessError::Hardware {
                peripheral,
                operation: Operation::Send,
                code,
            })?;

        #[cfg(feature = "defmt")]
        defmt::trace!("{}: sent {}", peripheral, frame);
        Ok(frame.len())
    }

    /// Wait for one frame and read it into `frame`. Returns its payload length.
    ///
    /// An empty FIFO is waited on; an error status ends the wait immediately
    /// with [`HarnessError::Hardware`].
    pub fn receive(&mut self, frame: &mut Frame) -> Result<usize, HarnessError> {
        self.receive_with(frame, PollContext::none())
    }

    pub fn receive_with(
        &mut self,
        frame: &mut Frame,
        ctx: PollContext<'_>,
    ) -> Result<usize, HarnessError> {
        let peripheral = self.handle.id();
        self.handle.ensure_operational(Operation::Receive)?;

        let poll = self.handle.poll(ctx);
        let driver = &mut self.handle.driver;
        poll.until(|_| match driver.error_status() {
                Some(code) => Poll::Ready(Err(code)),
                None if driver.is_rx_empty() => Poll::Pending,
                None => Poll::Ready(Ok(())),
            })
            .map_err(|err| {
                #[cfg(feature = "defmt")]
                defmt::warn!("{}: RX FIFO wait ended: {}", peripheral, err);
                HarnessError::from_poll(peripheral, Operation::Receive, err)
            })?;

        driver
            .recv_frame(frame)
            .map_err(|code| HarnessError::Hardware {
                peripheral,
                operation: Operation::Receive,
                code,
            })?;

        #[cfg(feature = "defmt")]
        defmt::trace!("{}: received {}", peripheral, frame);
        Ok(frame.len())
    }

    /// Send `tx`, receive into `rx` and verify identifier, length and payload
    /// (timestamp ignored). Used with the controller in loopback.
    pub fn exchange(&mut self, tx: &Frame, rx: &mut Frame) -> Result<usize, HarnessError> {
        self.exchange_with(tx, rx, PollContext::none())
    }

    pub fn exchange_with(
        &mut self,
        tx: &Frame,
        rx: &mut Frame,
        ctx: PollContext<'_>,
    ) -> Result<usize, HarnessError> {
        self.send_with(tx, ctx)?;
        self.receive_with(rx, ctx)?;
        verify_frame(tx, rx, &FrameMask::for_frame(tx))
    }
}

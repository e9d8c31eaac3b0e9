// Simulated controllers implementing the register traits for integration tests.
use polled_periph::config::PeripheralConfig;
use polled_periph::core::{HardwareCode, Mode};
use polled_periph::infra::poll::PollClock;
use polled_periph::peripheral::frame::Frame;
use polled_periph::peripheral::traits::{
    block_registers::BlockRegisters, frame_registers::FrameRegisters, peripheral::Peripheral,
};
use polled_periph::timing::{bit_timing::BitTiming, storage_clock::StorageClock};
use std::cell::Cell;
use std::collections::VecDeque;

use embassy_time::{Duration, Instant};

/// Status code reported when a register is written outside its mode.
#[allow(dead_code)]
pub const WRONG_MODE: HardwareCode = HardwareCode(0x0000_0BAD);

//==================================================================================SIM_CAN
#[allow(dead_code)]
/// CAN controller model: TX/RX FIFOs, optional internal loopback, mode lag.
pub struct SimCan {
    pub mode: Mode,
    pub(crate) pending: Option<Mode>,
    pub(crate) countdown: u32,
    /// Status reads before a requested mode is reached.
    pub mode_lag: u32,
    /// Requests for Operational are ignored (controller stuck in Configuration).
    pub never_operational: bool,
    /// Frames written to TX are looped back into RX.
    pub loopback: bool,
    pub tx_fifo: VecDeque<Frame>,
    pub rx_fifo: VecDeque<Frame>,
    pub tx_capacity: usize,
    /// Reported by the error status register while set.
    pub error: Option<HardwareCode>,
    /// Returned by the next `recv_frame`.
    pub recv_error: Option<HardwareCode>,
    /// XOR applied to the first data word of looped-back frames.
    pub corrupt_data: u32,
    pub timestamp: u16,
    pub timing: Option<BitTiming>,
    pub mode_requests: u32,
    pub status_polls: u32,
    pub frames_sent: u32,
}

#[allow(dead_code)]
impl SimCan {
    /// Controller in internal loopback, answering mode requests immediately.
    pub fn loopback() -> Self {
        Self {
            mode: Mode::Reset,
            pending: None,
            countdown: 0,
            mode_lag: 0,
            never_operational: false,
            loopback: true,
            tx_fifo: VecDeque::new(),
            rx_fifo: VecDeque::new(),
            tx_capacity: 64,
            error: None,
            recv_error: None,
            corrupt_data: 0,
            timestamp: 0,
            timing: None,
            mode_requests: 0,
            status_polls: 0,
            frames_sent: 0,
        }
    }

    /// Controller on a silent bus: nothing drains the TX FIFO, nothing arrives.
    pub fn silent_bus(tx_capacity: usize) -> Self {
        Self {
            loopback: false,
            tx_capacity,
            ..Self::loopback()
        }
    }
}

impl Peripheral for SimCan {
    type Timing = BitTiming;

    fn initialize(&mut self, _config: &PeripheralConfig) -> Result<(), HardwareCode> {
        self.mode = Mode::Reset;
        self.tx_fifo.clear();
        self.rx_fifo.clear();
        Ok(())
    }

    fn request_mode(&mut self, mode: Mode) {
        self.mode_requests += 1;
        if mode == Mode::Operational && self.never_operational {
            return;
        }
        self.pending = Some(mode);
        self.countdown = self.mode_lag;
    }

    fn mode(&mut self) -> Mode {
        self.status_polls += 1;
        if let Some(pending) = self.pending {
            if self.countdown == 0 {
                self.mode = pending;
                self.pending = None;
            } else {
                self.countdown -= 1;
            }
        }
        self.mode
    }

    fn write_timing(&mut self, timing: &BitTiming) -> Result<(), HardwareCode> {
        if self.mode != Mode::Configuration {
            return Err(WRONG_MODE);
        }
        self.timing = Some(*timing);
        Ok(())
    }

    fn error_status(&mut self) -> Option<HardwareCode> {
        self.error
    }
}

impl FrameRegisters for SimCan {
    fn is_tx_full(&mut self) -> bool {
        self.tx_fifo.len() >= self.tx_capacity
    }

    fn is_rx_empty(&mut self) -> bool {
        self.rx_fifo.is_empty()
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), HardwareCode> {
        if self.mode != Mode::Operational {
            return Err(WRONG_MODE);
        }
        self.frames_sent += 1;
        if !self.loopback {
            self.tx_fifo.push_back(*frame);
            return Ok(());
        }

        self.timestamp = self.timestamp.wrapping_add(0x0101);
        let mut words = frame.words();
        words[2] ^= self.corrupt_data;
        let echoed = Frame::from_words(words)
            .map_err(|_| HardwareCode(0xDEAD))?
            .with_timestamp(self.timestamp);
        self.rx_fifo.push_back(echoed);
        Ok(())
    }

    fn recv_frame(&mut self, frame: &mut Frame) -> Result<(), HardwareCode> {
        if let Some(code) = self.recv_error.take() {
            return Err(code);
        }
        *frame = self.rx_fifo.pop_front().ok_or(HardwareCode(0xE11))?;
        Ok(())
    }
}

//==================================================================================SIM_EMMC
#[allow(dead_code)]
/// eMMC model: in-memory sectors, busy countdown after each command.
pub struct SimEmmc {
    pub mode: Mode,
    pub memory: Vec<u8>,
    pub sec_count: u32,
    pub block_size: usize,
    /// Busy polls reported after every block command.
    pub busy_per_command: u32,
    busy: u32,
    /// Card never leaves busy once set.
    pub stuck_busy: bool,
    pub error: Option<HardwareCode>,
    /// Block index whose write fails.
    pub fail_write_at: Option<u32>,
    pub clock: Option<StorageClock>,
    /// Every clock written, in order.
    pub clock_history: Vec<StorageClock>,
    pub block_writes: u32,
    pub block_reads: u32,
}

#[allow(dead_code)]
impl SimEmmc {
    /// Card of `sectors` 512-byte sectors, filled with 0xFF (erased).
    pub fn new(sectors: u32) -> Self {
        Self {
            mode: Mode::Reset,
            memory: vec![0xFF; sectors as usize * 512],
            sec_count: sectors,
            block_size: 512,
            busy_per_command: 3,
            busy: 0,
            stuck_busy: false,
            error: None,
            fail_write_at: None,
            clock: None,
            clock_history: Vec::new(),
            block_writes: 0,
            block_reads: 0,
        }
    }

    fn range(&self, index: u32, len: usize) -> Result<std::ops::Range<usize>, HardwareCode> {
        let start = index as usize * self.block_size;
        let end = start + len;
        if len != self.block_size || end > self.memory.len() {
            // ADDRESS_OUT_OF_RANGE card status bit.
            return Err(HardwareCode(1 << 31));
        }
        Ok(start..end)
    }
}

impl Peripheral for SimEmmc {
    type Timing = StorageClock;

    fn initialize(&mut self, _config: &PeripheralConfig) -> Result<(), HardwareCode> {
        self.mode = Mode::Reset;
        Ok(())
    }

    fn request_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&mut self) -> Mode {
        self.mode
    }

    fn write_timing(&mut self, timing: &StorageClock) -> Result<(), HardwareCode> {
        self.clock = Some(*timing);
        self.clock_history.push(*timing);
        Ok(())
    }

    fn error_status(&mut self) -> Option<HardwareCode> {
        self.error
    }
}

impl BlockRegisters for SimEmmc {
    fn is_busy(&mut self) -> bool {
        if self.stuck_busy {
            return true;
        }
        if self.busy > 0 {
            self.busy -= 1;
            return true;
        }
        false
    }

    fn set_block_size(&mut self, size: usize) -> Result<(), HardwareCode> {
        self.block_size = size;
        Ok(())
    }

    fn read_ext_csd(&mut self, buffer: &mut [u8; 512]) -> Result<(), HardwareCode> {
        buffer.fill(0);
        buffer[212..216].copy_from_slice(&self.sec_count.to_le_bytes());
        Ok(())
    }

    fn read_block(&mut self, index: u32, buffer: &mut [u8]) -> Result<(), HardwareCode> {
        let range = self.range(index, buffer.len())?;
        buffer.copy_from_slice(&self.memory[range]);
        self.block_reads += 1;
        self.busy = self.busy_per_command;
        Ok(())
    }

    fn write_block(&mut self, index: u32, buffer: &[u8]) -> Result<(), HardwareCode> {
        self.block_writes += 1;
        if self.fail_write_at == Some(index) {
            // WP_VIOLATION card status bit.
            return Err(HardwareCode(1 << 26));
        }
        let range = self.range(index, buffer.len())?;
        self.memory[range].copy_from_slice(buffer);
        self.busy = self.busy_per_command;
        Ok(())
    }
}

//==================================================================================CLOCK
#[allow(dead_code)]
#[derive(Debug)]
/// Clock advancing one millisecond at every read.
pub struct SteppingClock {
    now: Cell<u64>,
}

#[allow(dead_code)]
impl SteppingClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    /// Clock with a `'static` lifetime, as configurations require.
    pub fn leaked() -> &'static Self {
        Box::leak(Box::new(Self::new()))
    }
}

impl PollClock for SteppingClock {
    fn now(&self) -> Instant {
        let now = self.now.get();
        self.now.set(now + Duration::from_millis(1).as_ticks());
        Instant::from_ticks(now)
    }
}

//! Classic CAN frame in the controller's FIFO word layout.
//!
//! ```text
//! word 0  IDR   standard: ID[10:0] @ 31..21, SRR (remote) @ 20
//!               extended: IDH[28:18] @ 31..21, SRR @ 20, IDE @ 19,
//!                         IDL[17:0] @ 18..1, RTR @ 0
//! word 1  DLCR  DLC @ 31..28, receive timestamp @ 15..0
//! word 2  data bytes 0..4
//! word 3  data bytes 4..8
//! ```
use embedded_can::{ExtendedId, Id, StandardId};

use crate::core::{FRAME_WORDS, MAX_FRAME_PAYLOAD};
use crate::error::ArgumentError;

pub const IDR_ID1_SHIFT: u32 = 21;
pub const IDR_ID1_MASK: u32 = 0xFFE0_0000;
pub const IDR_SRR_MASK: u32 = 0x0010_0000;
pub const IDR_IDE_MASK: u32 = 0x0008_0000;
pub const IDR_ID2_SHIFT: u32 = 1;
pub const IDR_ID2_MASK: u32 = 0x0007_FFFE;
pub const IDR_RTR_MASK: u32 = 0x0000_0001;

pub const DLCR_DLC_SHIFT: u32 = 28;
pub const DLCR_DLC_MASK: u32 = 0xF000_0000;
/// Bits stamped by the receiver; never part of what was sent.
pub const DLCR_TIMESTAMP_MASK: u32 = 0x0000_FFFF;

/// Byte image length of a frame (four words).
pub const FRAME_BYTES: usize = FRAME_WORDS * 4;

//==================================================================================FRAME
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One CAN frame: identifier word, length word and up to eight payload bytes.
pub struct Frame {
    idr: u32,
    dlcr: u32,
    data: [u8; MAX_FRAME_PAYLOAD],
}

impl Frame {
    /// Data frame carrying `data`; payloads above eight bytes are rejected.
    pub fn data_frame(id: impl Into<Id>, data: &[u8]) -> Result<Self, ArgumentError> {
        if data.len() > MAX_FRAME_PAYLOAD {
            return Err(ArgumentError::PayloadTooLong { len: data.len() });
        }
        let mut payload = [0u8; MAX_FRAME_PAYLOAD];
        payload[..data.len()].copy_from_slice(data);
        Ok(Self {
            idr: encode_id(id.into(), false),
            dlcr: (data.len() as u32) << DLCR_DLC_SHIFT,
            data: payload,
        })
    }

    /// Remote frame requesting `dlc` bytes.
    pub fn remote_frame(id: impl Into<Id>, dlc: usize) -> Result<Self, ArgumentError> {
        if dlc > MAX_FRAME_PAYLOAD {
            return Err(ArgumentError::PayloadTooLong { len: dlc });
        }
        Ok(Self {
            idr: encode_id(id.into(), true),
            dlcr: (dlc as u32) << DLCR_DLC_SHIFT,
            data: [0; MAX_FRAME_PAYLOAD],
        })
    }

    /// Rebuild a frame from FIFO words, rejecting a length code above eight.
    pub fn from_words(words: [u32; FRAME_WORDS]) -> Result<Self, ArgumentError> {
        let dlc = ((words[1] & DLCR_DLC_MASK) >> DLCR_DLC_SHIFT) as u8;
        if dlc as usize > MAX_FRAME_PAYLOAD {
            return Err(ArgumentError::InvalidLengthCode { dlc });
        }
        let mut data = [0u8; MAX_FRAME_PAYLOAD];
        data[..4].copy_from_slice(&words[2].to_le_bytes());
        data[4..].copy_from_slice(&words[3].to_le_bytes());
        Ok(Self {
            idr: words[0],
            dlcr: words[1],
            data,
        })
    }

    /// FIFO words as written to / read from the controller.
    pub fn words(&self) -> [u32; FRAME_WORDS] {
        let mut low = [0u8; 4];
        let mut high = [0u8; 4];
        low.copy_from_slice(&self.data[..4]);
        high.copy_from_slice(&self.data[4..]);
        [
            self.idr,
            self.dlcr,
            u32::from_le_bytes(low),
            u32::from_le_bytes(high),
        ]
    }

    /// Byte image of the four words (little-endian), as compared by the verifier.
    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let mut bytes = [0u8; FRAME_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn id_word(&self) -> u32 {
        self.idr
    }

    pub fn length_word(&self) -> u32 {
        self.dlcr
    }

    /// Receive timestamp stamped by the controller (0 for frames built locally).
    pub fn timestamp(&self) -> u16 {
        (self.dlcr & DLCR_TIMESTAMP_MASK) as u16
    }

    /// Copy with the receive timestamp replaced.
    pub fn with_timestamp(mut self, timestamp: u16) -> Self {
        self.dlcr = (self.dlcr & !DLCR_TIMESTAMP_MASK) | timestamp as u32;
        self
    }

    /// Declared payload length (DLC).
    pub fn len(&self) -> usize {
        ((self.dlcr & DLCR_DLC_MASK) >> DLCR_DLC_SHIFT) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn encode_id(id: Id, remote: bool) -> u32 {
    match id {
        Id::Standard(id) => {
            let srr = if remote { IDR_SRR_MASK } else { 0 };
            ((id.as_raw() as u32) << IDR_ID1_SHIFT) | srr
        }
        Id::Extended(id) => {
            let raw = id.as_raw();
            let rtr = if remote { IDR_RTR_MASK } else { 0 };
            ((raw >> 18) << IDR_ID1_SHIFT)
                | IDR_SRR_MASK
                | IDR_IDE_MASK
                | ((raw & 0x3_FFFF) << IDR_ID2_SHIFT)
                | rtr
        }
    }
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::data_frame(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        Self::remote_frame(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        self.idr & IDR_IDE_MASK != 0
    }

    fn is_remote_frame(&self) -> bool {
        if self.is_extended() {
            self.idr & IDR_RTR_MASK != 0
        } else {
            self.idr & IDR_SRR_MASK != 0
        }
    }

    fn id(&self) -> Id {
        let id1 = (self.idr & IDR_ID1_MASK) >> IDR_ID1_SHIFT;
        if self.is_extended() {
            let id2 = (self.idr & IDR_ID2_MASK) >> IDR_ID2_SHIFT;
            let raw = (id1 << 18) | id2;
            Id::Extended(ExtendedId::new(raw).unwrap_or(ExtendedId::ZERO))
        } else {
            Id::Standard(StandardId::new(id1 as u16).unwrap_or(StandardId::ZERO))
        }
    }

    fn dlc(&self) -> usize {
        self.len()
    }

    fn data(&self) -> &[u8] {
        if self.is_remote_frame() {
            return &[];
        }
        &self.data[..self.len()]
    }
}

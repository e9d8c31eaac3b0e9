//! Integrity verification of transferred data.
//!
//! Pure comparisons with no hardware access. Every function returns the number
//! of bytes that matched, [`HarnessError::IntegrityMismatch`] carrying the
//! first differing byte, or [`HarnessError::LengthMismatch`] when the common
//! bytes agree but one side is longer. Convert with `TransferOutcome::from`
//! for reporting.
use crate::core::MAX_FRAME_PAYLOAD;
use crate::error::HarnessError;
use crate::peripheral::frame::{Frame, DLCR_TIMESTAMP_MASK, FRAME_BYTES};

//==================================================================================BYTES
/// Byte-for-byte comparison. A differing byte in the common prefix wins over a
/// length difference.
pub fn verify_bytes(expected: &[u8], actual: &[u8]) -> Result<usize, HarnessError> {
    if let Some((index, (&e, &a))) = expected
        .iter()
        .zip(actual)
        .enumerate()
        .find(|(_, (e, a))| e != a)
    {
        return Err(mismatch_at(index, e, a));
    }

    if expected.len() != actual.len() {
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "Length mismatch: expected {} bytes, got {}",
            expected.len(),
            actual.len()
        );
        return Err(HarnessError::LengthMismatch {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    Ok(expected.len())
}

/// Check that `actual` starts with `expected`; trailing bytes are ignored.
///
/// Used when a pattern shorter than the transfer unit was written, e.g. a
/// 20-byte pattern inside a full block.
pub fn verify_prefix(expected: &[u8], actual: &[u8]) -> Result<usize, HarnessError> {
    let head = actual.get(..expected.len()).unwrap_or(actual);
    verify_bytes(expected, head)
}

//==================================================================================FRAMES
/// Bits of a frame's byte image that take part in a comparison. A cleared bit
/// is never compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameMask {
    pub idr: u32,
    pub dlcr: u32,
    pub data: [u8; MAX_FRAME_PAYLOAD],
}

impl FrameMask {
    /// Everything except the receive timestamp.
    pub const ALL_BUT_TIMESTAMP: Self = Self {
        idr: u32::MAX,
        dlcr: !DLCR_TIMESTAMP_MASK,
        data: [0xFF; MAX_FRAME_PAYLOAD],
    };

    /// Identifier, declared length and the payload bytes `sent` actually
    /// carries. Padding bytes past the DLC and the timestamp are ignored.
    pub fn for_frame(sent: &Frame) -> Self {
        let carried = if embedded_can::Frame::is_remote_frame(sent) {
            0
        } else {
            sent.len()
        };
        let mut data = [0u8; MAX_FRAME_PAYLOAD];
        data[..carried].fill(0xFF);
        Self {
            data,
            ..Self::ALL_BUT_TIMESTAMP
        }
    }

    /// Byte image of the mask, aligned with [`Frame::to_bytes`].
    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let mut bytes = [0u8; FRAME_BYTES];
        bytes[0..4].copy_from_slice(&self.idr.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.dlcr.to_le_bytes());
        bytes[8..].copy_from_slice(&self.data);
        bytes
    }
}

/// Compare a received frame against the one sent under `mask`.
///
/// Indices refer to the frame's byte image (`0..4` identifier word, `4..8`
/// length word, `8..16` payload); reported values are masked. Returns the
/// payload length on success.
pub fn verify_frame(sent: &Frame, received: &Frame, mask: &FrameMask) -> Result<usize, HarnessError> {
    let expected = sent.to_bytes();
    let actual = received.to_bytes();
    let mask = mask.to_bytes();

    for (index, ((e, a), m)) in expected.iter().zip(&actual).zip(&mask).enumerate() {
        if e & m != a & m {
            return Err(mismatch_at(index, e & m, a & m));
        }
    }
    Ok(sent.len())
}

fn mismatch_at(index: usize, expected: u8, actual: u8) -> HarnessError {
    #[cfg(feature = "defmt")]
    defmt::warn!(
        "Integrity mismatch at byte {}: expected {=u8:#x}, got {=u8:#x}",
        index,
        expected,
        actual
    );
    HarnessError::IntegrityMismatch {
        index,
        expected,
        actual,
    }
}

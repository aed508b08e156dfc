//! Command frames and telemetry decoding.
//!
//! Every command is a fixed 6-byte frame:
//!
//! ```text
//! F1 F1 <opcode> <len=00> <checksum> 7E
//! ```
//!
//! with `checksum = (opcode + len) mod 256`. Only zero-payload frames are
//! ever sent, so the checksum always equals the opcode.
//!
//! Telemetry notifications carry a signed 16-bit big-endian height in
//! tenths of the native unit; its offset depends on the protocol revision.

use crate::error::DeskError;

pub const FRAME_LEN: usize = 6;
pub const HEADER: [u8; 2] = [0xF1, 0xF1];
pub const FOOTER: u8 = 0x7E;

/// The four commands the desk understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Raise = 0x01,
    Lower = 0x02,
    Query = 0x07,
    Stop = 0x2B,
}

impl Opcode {
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DeskError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x01 => Ok(Self::Raise),
            0x02 => Ok(Self::Lower),
            0x07 => Ok(Self::Query),
            0x2B => Ok(Self::Stop),
            other => Err(DeskError::MalformedFrame(format!(
                "unknown opcode 0x{other:02X}"
            ))),
        }
    }
}

/// One encoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
    op: Opcode,
}

impl Frame {
    pub fn encode(op: Opcode) -> Self {
        let opcode = op.as_byte();
        let len = 0u8;
        Self {
            bytes: [
                HEADER[0],
                HEADER[1],
                opcode,
                len,
                opcode.wrapping_add(len),
                FOOTER,
            ],
            op,
        }
    }

    /// Validate raw bytes as a command frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, DeskError> {
        let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
            DeskError::MalformedFrame(format!("expected {FRAME_LEN} bytes, got {}", bytes.len()))
        })?;
        if raw[..2] != HEADER || raw[5] != FOOTER {
            return Err(DeskError::MalformedFrame("bad header or footer".into()));
        }
        if raw[3] != 0 {
            return Err(DeskError::MalformedFrame(format!(
                "unexpected payload length {}",
                raw[3]
            )));
        }
        if raw[2].wrapping_add(raw[3]) != raw[4] {
            return Err(DeskError::MalformedFrame(format!(
                "checksum mismatch: 0x{:02X}",
                raw[4]
            )));
        }
        let op = Opcode::try_from(raw[2])?;
        Ok(Self { bytes: raw, op })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn opcode(&self) -> Opcode {
        self.op
    }
}

/// Free-function form of [`Frame::encode`].
#[inline]
pub fn encode(op: Opcode) -> Frame {
    Frame::encode(op)
}

/// Where the height lives inside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryLayout {
    /// Four leading bytes, then the height.
    #[default]
    Offset4,
    /// Two 16-bit leading fields, two status bytes, then the height.
    StatusInterleaved,
}

impl TelemetryLayout {
    pub fn height_offset(self) -> usize {
        match self {
            Self::Offset4 => 4,
            Self::StatusInterleaved => 6,
        }
    }

    /// Minimum notification length for this layout.
    pub fn min_len(self) -> usize {
        self.height_offset() + 2
    }
}

/// A decoded position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryReading {
    /// Raw height in tenths of the native unit.
    pub height_tenths: i16,
}

impl TelemetryReading {
    /// Height in native units.
    pub fn height(&self) -> f64 {
        f64::from(self.height_tenths) / 10.0
    }
}

pub fn decode_telemetry(bytes: &[u8], layout: TelemetryLayout) -> Result<TelemetryReading, DeskError> {
    let off = layout.height_offset();
    match bytes.get(off..off + 2) {
        Some(&[hi, lo]) => Ok(TelemetryReading {
            height_tenths: i16::from_be_bytes([hi, lo]),
        }),
        _ => Err(DeskError::MalformedFrame(format!(
            "telemetry needs {} bytes, got {}",
            layout.min_len(),
            bytes.len()
        ))),
    }
}

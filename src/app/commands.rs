//! Inbound motion commands.
//!
//! The link collaborator delivers one opcode byte per command.  [`decode`]
//! classifies a raw byte into a real command, the idle sentinel the link
//! clocks out after a reset, or an unknown opcode.  The
//! [`MotionService`](super::service::MotionService) interprets the result.

use core::fmt;

/// Byte the link reports when it has no command ready (bus idle / reset).
pub const SENTINEL_BYTE: u8 = 0xFF;

/// Motion command opcodes, discriminant = wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Stop = 0x00,
    RotateCw90 = 0x02,
    RotateCw45 = 0x03,
    RotateCcw90 = 0x04,
    RotateCcw45 = 0x05,
    DriveForwardHalf = 0x08,
    DriveForwardFull = 0x09,
    DriveReverseHalf = 0x10,
    DriveReverseFull = 0x11,
    AlignToBeacon = 0x20,
    DriveToLine = 0x40,
    EndRun = 0x80,
}

impl Opcode {
    /// Every opcode, in wire order.
    pub const ALL: [Opcode; 12] = [
        Self::Stop,
        Self::RotateCw90,
        Self::RotateCw45,
        Self::RotateCcw90,
        Self::RotateCcw45,
        Self::DriveForwardHalf,
        Self::DriveForwardFull,
        Self::DriveReverseHalf,
        Self::DriveReverseFull,
        Self::AlignToBeacon,
        Self::DriveToLine,
        Self::EndRun,
    ];

    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Position of this opcode in [`Opcode::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Stop => 0,
            Self::RotateCw90 => 1,
            Self::RotateCw45 => 2,
            Self::RotateCcw90 => 3,
            Self::RotateCcw45 => 4,
            Self::DriveForwardHalf => 5,
            Self::DriveForwardFull => 6,
            Self::DriveReverseHalf => 7,
            Self::DriveReverseFull => 8,
            Self::AlignToBeacon => 9,
            Self::DriveToLine => 10,
            Self::EndRun => 11,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Stop),
            0x02 => Some(Self::RotateCw90),
            0x03 => Some(Self::RotateCw45),
            0x04 => Some(Self::RotateCcw90),
            0x05 => Some(Self::RotateCcw45),
            0x08 => Some(Self::DriveForwardHalf),
            0x09 => Some(Self::DriveForwardFull),
            0x10 => Some(Self::DriveReverseHalf),
            0x11 => Some(Self::DriveReverseFull),
            0x20 => Some(Self::AlignToBeacon),
            0x40 => Some(Self::DriveToLine),
            0x80 => Some(Self::EndRun),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "stop",
            Self::RotateCw90 => "rotate-cw-90",
            Self::RotateCw45 => "rotate-cw-45",
            Self::RotateCcw90 => "rotate-ccw-90",
            Self::RotateCcw45 => "rotate-ccw-45",
            Self::DriveForwardHalf => "forward-half",
            Self::DriveForwardFull => "forward-full",
            Self::DriveReverseHalf => "reverse-half",
            Self::DriveReverseFull => "reverse-full",
            Self::AlignToBeacon => "align-beacon",
            Self::DriveToLine => "drive-to-line",
            Self::EndRun => "end-run",
        };
        f.write_str(name)
    }
}

/// Classification of one raw link byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A real command.
    Command(Opcode),
    /// The idle/sentinel byte: not a command, no actuation, no re-request.
    Sentinel,
    /// Unrecognised opcode: no actuation, but flow control still runs.
    Unknown(u8),
}

/// Classify a raw opcode byte.
pub fn decode(byte: u8) -> Decoded {
    if byte == SENTINEL_BYTE {
        return Decoded::Sentinel;
    }
    match Opcode::from_byte(byte) {
        Some(op) => Decoded::Command(op),
        None => Decoded::Unknown(byte),
    }
}

// ---------------------------------------------------------------------------
// Motion vocabulary shared by the dispatcher and the actuation primitives
// ---------------------------------------------------------------------------

/// Linear drive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

/// In-place rotation sense, viewed from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

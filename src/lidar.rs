// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common sensor types, diagnostics, and error handling.
//!
//! This module provides the sensor identity types shared by every part of
//! the interpreter, the [`Warning`] side channel used for recoverable
//! inconsistencies, and the [`PacketInterpreter`] trait consumed by the
//! orchestration layer.

use crate::{
    frame::{Frame, FrameInfo},
    packet::RawPacket,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias for the fallible seams of the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Common error type.
///
/// Packet decoding itself never surfaces these: a packet that fails to
/// parse is skipped. Errors are returned by construction-time APIs
/// (calibration, configuration) and by packet sources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Unexpected end of data at given byte position
    #[error("unexpected end of data at {0} bytes")]
    UnexpectedEnd(usize),
    /// Unknown firing block identifier
    #[error("unknown block identifier 0x{id:04x} in block {block}")]
    UnknownBlockId { block: usize, id: u16 },
    /// Invalid calibration description
    #[error("invalid calibration: {0}")]
    Calibration(String),
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
    /// JSON configuration could not be decoded
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Replay source exhausted
    #[error("no more packets")]
    Exhausted,
}

/// Sensor model reported in factory field 2, or recognised from the
/// packet structure (HDL-64).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SensorModel {
    /// HDL-32E
    Hdl32,
    /// VLP-16 (Puck)
    Vlp16,
    /// VLP-16 Hi-Res
    Vlp16HiRes,
    /// VLP-32A/B
    Vlp32Ab,
    /// VLP-32C (Ultra Puck)
    Vlp32C,
    /// HDL-64E S2/S3
    Hdl64,
    /// VLS-128 (Alpha Prime)
    Vls128,
    /// Model byte not recognised
    #[default]
    #[value(skip)]
    Unknown,
}

impl SensorModel {
    /// Decode factory field 2.
    pub fn from_factory_byte(value: u8) -> Self {
        match value {
            0x21 => SensorModel::Hdl32,
            0x22 => SensorModel::Vlp16,
            0x23 => SensorModel::Vlp32Ab,
            0x24 => SensorModel::Vlp16HiRes,
            0x28 => SensorModel::Vlp32C,
            0xa1 => SensorModel::Vls128,
            _ => SensorModel::Unknown,
        }
    }

    /// Factory field 2 value for this model. HDL-64 has none since its
    /// factory fields carry rolling status bytes.
    pub fn factory_byte(&self) -> Option<u8> {
        match self {
            SensorModel::Hdl32 => Some(0x21),
            SensorModel::Vlp16 => Some(0x22),
            SensorModel::Vlp32Ab => Some(0x23),
            SensorModel::Vlp16HiRes => Some(0x24),
            SensorModel::Vlp32C => Some(0x28),
            SensorModel::Vls128 => Some(0xa1),
            SensorModel::Hdl64 | SensorModel::Unknown => None,
        }
    }

    /// Number of lasers this model carries.
    pub fn laser_count(&self) -> usize {
        match self {
            SensorModel::Vlp16 | SensorModel::Vlp16HiRes => 16,
            SensorModel::Hdl32 | SensorModel::Vlp32Ab | SensorModel::Vlp32C => 32,
            SensorModel::Hdl64 => 64,
            SensorModel::Vls128 => 128,
            SensorModel::Unknown => 32,
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorModel::Hdl32 => write!(f, "HDL-32E"),
            SensorModel::Vlp16 => write!(f, "VLP-16"),
            SensorModel::Vlp16HiRes => write!(f, "VLP-16 Hi-Res"),
            SensorModel::Vlp32Ab => write!(f, "VLP-32AB"),
            SensorModel::Vlp32C => write!(f, "VLP-32C"),
            SensorModel::Hdl64 => write!(f, "HDL-64"),
            SensorModel::Vls128 => write!(f, "VLS-128"),
            SensorModel::Unknown => write!(f, "unknown sensor"),
        }
    }
}

/// Return mode values carried in factory field 1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnMode {
    /// Strongest return only
    #[default]
    Strongest = 0x37,
    /// Last return only
    Last = 0x38,
    /// Strongest and last returns in paired blocks
    Dual = 0x39,
}

impl ReturnMode {
    /// Decode factory field 1, `None` for any other value.
    pub fn from_factory_byte(value: u8) -> Option<Self> {
        match value {
            0x37 => Some(ReturnMode::Strongest),
            0x38 => Some(ReturnMode::Last),
            0x39 => Some(ReturnMode::Dual),
            _ => None,
        }
    }

    pub fn is_dual(&self) -> bool {
        *self == ReturnMode::Dual
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReturnMode::Strongest => write!(f, "strongest return"),
            ReturnMode::Last => write!(f, "last return"),
            ReturnMode::Dual => write!(f, "dual return"),
        }
    }
}

/// Sensor power state as described by the calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerMode {
    #[default]
    Unknown,
    /// Lasers powered with sensor-side intensity correction disabled
    Normal,
    /// Sensor already applies intensity correction on board
    CorrectionOn,
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PowerMode::Unknown => write!(f, "unknown"),
            PowerMode::Normal => write!(f, "normal"),
            PowerMode::CorrectionOn => write!(f, "intensity correction on"),
        }
    }
}

/// Detected or configured sensor identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorState {
    pub model: SensorModel,
    pub return_mode: ReturnMode,
    pub power_mode: PowerMode,
    /// Packets carry upper/lower half-blocks (HDL-64)
    pub is_hdl64: bool,
    /// Packets carry four 32-laser block banks (VLS-128)
    pub is_vls128: bool,
    /// Last factory field 1 seen
    pub factory_field1: u8,
    /// Last factory field 2 seen
    pub factory_field2: u8,
}

/// Recoverable inconsistency reported through the side channel.
///
/// Each kind is raised at most once per session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The packet reports a different model than the calibration describes
    SensorMismatch {
        reported: SensorModel,
        calibrated: SensorModel,
    },
    /// The packet model byte is not recognised
    UnknownReportedSensor(u8),
    /// A lower half-block firing arrived while configured for fewer lasers
    UnsupportedHdl64Firing { laser_count: usize },
    /// A firing addressed a laser beyond the configured laser count
    LaserIdOutOfRange { laser_id: usize, laser_count: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::SensorMismatch {
                reported,
                calibrated,
            } => write!(
                f,
                "sensor reports {} but the calibration describes {}; keeping the calibration",
                reported, calibrated
            ),
            Warning::UnknownReportedSensor(byte) => {
                write!(f, "sensor reports unknown model byte 0x{:02x}", byte)
            }
            Warning::UnsupportedHdl64Firing { laser_count } => write!(
                f,
                "received an HDL-64 lower block firing with a {}-laser calibration; ignoring it",
                laser_count
            ),
            Warning::LaserIdOutOfRange {
                laser_id,
                laser_count,
            } => write!(
                f,
                "laser id {} exceeds the {} configured lasers; ignoring the firing",
                laser_id, laser_count
            ),
        }
    }
}

/// Result of decoding one packet.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    /// Frames completed while decoding the packet, in order
    pub frames: Vec<Frame>,
    /// Warnings raised while decoding the packet
    pub warnings: Vec<Warning>,
}

impl ProcessOutput {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.warnings.is_empty()
    }
}

/// Entry points consumed by the orchestration layer.
///
/// Implementations are single-threaded state machines: packets must be
/// delivered in recording order and a single instance must not be shared
/// across concurrent decode calls.
pub trait PacketInterpreter: Send {
    /// Cheap structural test, no state change.
    fn is_lidar_packet(&self, data: &[u8]) -> bool;

    /// Decode one packet, returning completed frames and warnings.
    fn process_packet(&mut self, packet: &RawPacket<'_>) -> ProcessOutput;

    /// Catalog pass: returns an entry when a frame begins in this packet.
    fn preprocess_packet(&mut self, packet: &RawPacket<'_>) -> Option<FrameInfo>;

    /// Finalize the frame in progress. Without `force`, empty frames are
    /// not emitted.
    fn split_frame(&mut self, force: bool) -> Option<Frame>;

    /// Discard the frame in progress without emitting it.
    fn reset_current_frame(&mut self);

    /// Human-readable summary of the detected sensor.
    fn sensor_information(&self) -> String;
}

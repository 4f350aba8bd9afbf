// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Velodyne Library
//!
//! Decoder for the 1206-byte data packets of legacy Velodyne sensors
//! (HDL-32E, HDL-64, VLP-16, VLP-32, VLS-128) into point-cloud frames.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌────────────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │ LegacyInterpreter  │ ──► │  Frame          │
//! │  (records/test) │     │ (stateful decoder) │     │  (caller-owned) │
//! └─────────────────┘     └────────────────────┘     └─────────────────┘
//!                                   │
//!                                   ▼
//!                          ProcessOutput::warnings
//! ```
//!
//! The interpreter never performs I/O. Each packet is classified, checked
//! against the calibration, decoded firing by firing and appended to the
//! frame in progress. When the azimuth wraps the frame is handed over to
//! the caller, who becomes its sole owner.
//!
//! # Modules
//!
//! - [`lidar`]: Common types, warnings, traits, and error handling
//! - [`packet`]: Packet layout and classification
//! - [`calibration`]: Per-laser corrections and sensor variants
//! - [`accumulator`]: Sensor inference when no calibration is supplied
//! - [`timestamp`]: Rollover-aware timestamps and RPM estimation
//! - [`dual_return`]: Dual-return classification
//! - [`firing`]: Geometry and intra-firing corrections
//! - [`framing`]: Frame boundary state machine
//! - [`buffer`]: Columnar point storage and frame assembly
//! - [`interpreter`]: The decoder
//! - [`packet_source`]: Packet sources and replay
//! - [`synthetic`]: Packet construction for tests and benchmarks
//!
//! # Example
//!
//! ```
//! use edgefirst_velodyne::{
//!     Calibration, InterpreterConfig, LegacyInterpreter, PacketInterpreter, RawPacket,
//!     SensorModel, synthetic::PacketBuilder,
//! };
//!
//! let calibration = Calibration::factory_default(SensorModel::Hdl32);
//! let mut interpreter =
//!     LegacyInterpreter::with_calibration(InterpreterConfig::default(), calibration).unwrap();
//!
//! let packet = PacketBuilder::new().sweep(0, 20).fill(5_000, 80).build();
//! if interpreter.is_lidar_packet(&packet) {
//!     let output = interpreter.process_packet(&RawPacket::new(&packet));
//!     assert!(output.warnings.is_empty());
//! }
//!
//! let frame = interpreter.split_frame(true).unwrap();
//! let (x, y, z) = (frame.x(), frame.y(), frame.z());
//! assert_eq!(x.len(), 384);
//! assert_eq!(y.len(), z.len());
//! ```

pub mod accumulator;
pub mod buffer;
pub mod calibration;
pub mod config;
pub mod dual_return;
pub mod firing;
pub mod frame;
pub mod framing;
pub mod interpreter;
pub mod lidar;
pub mod packet;
pub mod packet_source;
pub mod synthetic;
pub mod timestamp;

// Re-exports for convenience
pub use calibration::{Calibration, LaserCorrection, SensorVariant};
pub use config::InterpreterConfig;
pub use dual_return::DualFlags;
pub use frame::{Frame, FrameInfo, Point};
pub use interpreter::LegacyInterpreter;
pub use lidar::{
    Error, PacketInterpreter, PowerMode, ProcessOutput, ReturnMode, SensorModel, SensorState,
    Warning,
};
pub use packet::{RawPacket, is_lidar_packet};
pub use packet_source::PacketSource;

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Legacy Velodyne packet interpreter.
//!
//! [`LegacyInterpreter`] is the stateful decoder behind
//! [`PacketInterpreter`]. One instance owns a decode session: the sensor
//! identity, the timestamp and RPM trackers, the framing state machine and
//! the frame in progress. Packets are decoded block by block; the framing
//! check runs before each block so the block that wraps the azimuth is the
//! first block of the new frame.
//!
//! ```
//! use edgefirst_velodyne::{
//!     config::InterpreterConfig,
//!     interpreter::LegacyInterpreter,
//!     lidar::PacketInterpreter,
//!     packet::RawPacket,
//!     synthetic::PacketBuilder,
//! };
//!
//! let mut interpreter = LegacyInterpreter::new(InterpreterConfig::default()).unwrap();
//! let first = PacketBuilder::new().sweep(35_000, 40).fill(500, 10).build();
//! let second = PacketBuilder::new().sweep(35_880, 40).fill(500, 10).build();
//!
//! assert!(interpreter.process_packet(&RawPacket::new(&first)).frames.is_empty());
//! let output = interpreter.process_packet(&RawPacket::new(&second));
//! assert_eq!(output.frames.len(), 1);
//! ```

use crate::{
    accumulator::RollingCalibrationAccumulator,
    buffer::FrameBuilder,
    calibration::Calibration,
    config::InterpreterConfig,
    dual_return::{DualFlags, DualResolution, resolve},
    firing::{FiringProcessor, azimuth_step},
    frame::{Frame, FrameInfo},
    framing::FramingState,
    lidar::{
        PacketInterpreter, PowerMode, ProcessOutput, Result, SensorModel, SensorState, Warning,
    },
    packet::{
        self, BlockId, FIRINGS_PER_PACKET, LASERS_PER_FIRING, MAX_LASERS, PacketSlice, RawPacket,
    },
    timestamp::{RpmEstimator, TimestampEngine},
};
use tracing::{debug, trace, warn};

/// Indices of the most recent point of each raw laser, used to match the
/// two returns of a dual pair.
#[derive(Debug)]
struct DualPairing {
    last_point: [Option<usize>; MAX_LASERS],
    /// First point index of the pair in progress
    pair_start: usize,
}

impl DualPairing {
    fn new() -> Self {
        Self {
            last_point: [None; MAX_LASERS],
            pair_start: 0,
        }
    }

    /// First return of `raw_laser` within the pair in progress.
    fn first_return(&self, raw_laser: usize) -> Option<usize> {
        self.last_point[raw_laser].filter(|&index| index >= self.pair_start)
    }

    fn reset(&mut self) {
        self.last_point = [None; MAX_LASERS];
        self.pair_start = 0;
    }
}

/// One-shot diagnostic flags, rearmed only when the session is reset.
#[derive(Debug, Clone, Copy)]
struct Latches {
    check_sensor: bool,
    warn_hdl64: bool,
    warn_laser_range: bool,
}

impl Latches {
    fn armed(check_sensor: bool) -> Self {
        Self {
            check_sensor,
            warn_hdl64: true,
            warn_laser_range: true,
        }
    }
}

/// Framing and timing state of the catalog pass, independent of decoding.
#[derive(Debug, Default)]
struct Catalog {
    framing: FramingState,
    timestamps: TimestampEngine,
    started: bool,
}

fn raise(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{}", warning);
    warnings.push(warning);
}

/// Decoder for 1206-byte legacy Velodyne data packets.
#[derive(Debug)]
pub struct LegacyInterpreter {
    config: InterpreterConfig,
    laser_mask: [bool; MAX_LASERS],
    calibration: Calibration,
    calibration_supplied: bool,
    sensor: SensorState,
    accumulator: RollingCalibrationAccumulator,
    timestamps: TimestampEngine,
    rpm: RpmEstimator,
    framing: FramingState,
    frame: FrameBuilder,
    pairing: DualPairing,
    catalog: Catalog,
    latches: Latches,
    /// Leading blocks of the next packet that belong to a previous frame
    skip_next: usize,
}

impl LegacyInterpreter {
    /// Interpreter that infers the sensor from the packets.
    pub fn new(config: InterpreterConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Interpreter decoding with a caller-supplied calibration.
    pub fn with_calibration(config: InterpreterConfig, calibration: Calibration) -> Result<Self> {
        Self::build(config, Some(calibration))
    }

    fn build(config: InterpreterConfig, calibration: Option<Calibration>) -> Result<Self> {
        config.validate()?;
        let calibration_supplied = calibration.is_some();
        let calibration = calibration.unwrap_or_else(|| Calibration::unit(32));

        let mut interpreter = Self {
            laser_mask: config.laser_mask(),
            sensor: SensorState::default(),
            accumulator: RollingCalibrationAccumulator::new(),
            timestamps: TimestampEngine::new(),
            rpm: RpmEstimator::new(),
            framing: FramingState::new(config.rollover_margin),
            frame: FrameBuilder::new(config.points_per_frame),
            pairing: DualPairing::new(),
            catalog: Catalog::default(),
            latches: Latches::armed(calibration_supplied),
            skip_next: 0,
            calibration,
            calibration_supplied,
            config,
        };
        interpreter.reset();
        Ok(interpreter)
    }

    /// Apply a new configuration and start a new session.
    pub fn reconfigure(&mut self, config: InterpreterConfig) -> Result<()> {
        config.validate()?;
        self.laser_mask = config.laser_mask();
        self.frame = FrameBuilder::new(config.points_per_frame);
        self.config = config;
        self.reset();
        Ok(())
    }

    /// Replace the calibration, or return to inference with `None`, and
    /// start a new session.
    pub fn set_calibration(&mut self, calibration: Option<Calibration>) {
        self.calibration_supplied = calibration.is_some();
        self.calibration = calibration.unwrap_or_else(|| Calibration::unit(32));
        self.reset();
    }

    /// Start a new session: frame numbering, timing, framing, sensor
    /// inference and one-shot warnings all restart.
    pub fn reset(&mut self) {
        if !self.calibration_supplied {
            self.calibration = Calibration::unit(32);
        }
        self.sensor = SensorState {
            model: self.calibration.model(),
            power_mode: self.calibration.power_mode(),
            ..Default::default()
        };
        self.accumulator.reset();
        self.timestamps.reset();
        self.timestamps.set_time_adjust(self.config.time_adjust);
        self.rpm.reset();
        self.framing = FramingState::new(self.config.rollover_margin);
        self.frame.reset();
        self.pairing.reset();
        self.catalog = Catalog {
            framing: FramingState::new(self.config.rollover_margin),
            ..Default::default()
        };
        self.catalog.timestamps.set_time_adjust(self.config.time_adjust);
        self.latches = Latches::armed(self.calibration_supplied);
        self.skip_next = 0;
    }

    /// External clock offset in microseconds (GPS synchronised source).
    pub fn set_time_adjust(&mut self, time_adjust: f64) {
        self.config.time_adjust = time_adjust;
        self.timestamps.set_time_adjust(time_adjust);
        self.catalog.timestamps.set_time_adjust(time_adjust);
    }

    /// Continue decoding from a catalog entry.
    ///
    /// The frame in progress is discarded. The next packet handed to
    /// [`PacketInterpreter::process_packet`] must be the one the entry
    /// points at; its leading firings that belong to the previous frame
    /// are skipped.
    pub fn resume_from(&mut self, info: &FrameInfo) {
        self.frame.discard();
        self.pairing.reset();
        self.framing.reset();
        self.rpm.reset();
        self.timestamps.seed(info.first_raw_time, info.rolling_count);
        self.skip_next = info.firing_to_skip.min(FIRINGS_PER_PACKET);
        debug!(
            "resuming at position {:?}, skipping {} firings",
            info.file_position, info.firing_to_skip
        );
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn sensor_state(&self) -> &SensorState {
        &self.sensor
    }

    /// Mean rotation speed over the recent frames
    pub fn rpm(&self) -> f64 {
        self.rpm.rpm()
    }

    /// Time counter rollovers seen by the decode session
    pub fn rolling_count(&self) -> u32 {
        self.timestamps.rolling_count()
    }

    /// Points accumulated in the frame in progress
    pub fn pending_points(&self) -> usize {
        self.frame.len()
    }

    fn check_sensor(&mut self, slice: &PacketSlice<'_>, warnings: &mut Vec<Warning>) {
        if !self.latches.check_sensor {
            return;
        }
        self.latches.check_sensor = false;

        let reported = slice.reported_model();
        let calibrated = self.calibration.model();
        if reported == SensorModel::Unknown {
            raise(warnings, Warning::UnknownReportedSensor(slice.factory_field2()));
        } else if calibrated != SensorModel::Unknown && reported != calibrated {
            raise(
                warnings,
                Warning::SensorMismatch {
                    reported,
                    calibrated,
                },
            );
        }
    }

    /// Refresh the sensor state from one accepted packet.
    fn update_sensor(&mut self, slice: &PacketSlice<'_>) {
        let hdl64 = slice.is_hdl64();
        let vls128 = slice.is_vls128();

        if !self.calibration_supplied {
            if let Some(state) = self.accumulator.observe(slice) {
                debug!(
                    "identified {} ({}) after {} packets",
                    state.model,
                    state.return_mode,
                    self.accumulator.len()
                );
                self.sensor = SensorState {
                    power_mode: PowerMode::Normal,
                    ..state
                };
                self.calibration = Calibration::factory_default(state.model);
            } else if !self.accumulator.is_converged() {
                self.sensor.model = slice.reported_model();
                let laser_count = if vls128 {
                    128
                } else if hdl64 {
                    64
                } else {
                    32
                };
                if self.calibration.laser_count() != laser_count {
                    self.calibration = Calibration::unit(laser_count);
                }
            }
        }

        self.sensor.factory_field1 = slice.factory_field1();
        self.sensor.factory_field2 = slice.factory_field2();
        self.sensor.is_hdl64 = hdl64;
        self.sensor.is_vls128 = vls128;
        self.sensor.return_mode = match self.config.return_mode {
            Some(mode) => mode,
            None if hdl64 => slice.hdl64_return_mode(),
            None => slice.return_mode().unwrap_or(self.sensor.return_mode),
        };
    }
}

impl PacketInterpreter for LegacyInterpreter {
    fn is_lidar_packet(&self, data: &[u8]) -> bool {
        packet::is_lidar_packet(data)
    }

    fn process_packet(&mut self, packet: &RawPacket<'_>) -> ProcessOutput {
        let mut output = ProcessOutput::default();
        let slice = match PacketSlice::from_slice(packet.data) {
            Ok(slice) => slice,
            Err(err) => {
                trace!("skipping packet: {}", err);
                return output;
            }
        };

        self.check_sensor(&slice, &mut output.warnings);
        self.update_sensor(&slice);

        let raw_time = slice.raw_time();
        let packet_time = self.timestamps.compute(raw_time);
        let hdl64 = slice.is_hdl64();
        let dual = self.sensor.return_mode.is_dual();
        let group = PacketSlice::dual_group_size(hdl64, slice.is_vls128());
        let laser_count = self.calibration.laser_count();
        let fold_lanes = laser_count == 16;
        let stride = self.config.firing_skip + 1;

        let processor = FiringProcessor {
            calibration: &self.calibration,
            variant: self.calibration.variant(),
            packet_time,
            raw_time,
            dual,
            hdl64,
            azimuth_step: azimuth_step(&slice, hdl64),
            intensity_correction: self.config.intensity_correction
                && hdl64
                && self.sensor.power_mode != PowerMode::CorrectionOn,
            intra_firing_adjustment: self.config.intra_firing_adjustment,
        };

        let first_block = std::mem::take(&mut self.skip_next);
        for block in first_block..FIRINGS_PER_PACKET {
            let firing = slice.firing(block);
            let azimuth = firing.azimuth();

            if self.framing.observe(azimuth) {
                if let Some(rpm) = self.rpm.on_boundary(packet_time) {
                    trace!("rotation completed at {:.1} rpm", rpm);
                }
                self.pairing.reset();
                if self.frame.is_empty() {
                    self.frame.discard();
                } else {
                    let frame = self.frame.finalize(self.rpm.rpm());
                    debug!(
                        "frame {} completed with {} points",
                        frame.frame_id(),
                        frame.len()
                    );
                    output.frames.push(frame);
                }
            }

            self.frame.begin(FrameInfo {
                file_position: packet.file_position,
                network_time: packet.network_time,
                first_raw_time: raw_time,
                firing_to_skip: block,
                rolling_count: self.timestamps.rolling_count(),
            });

            // A dual-return group starts even when its first block is skipped
            if block % group == 0 {
                self.pairing.pair_start = self.frame.len();
            }

            if block % stride != 0 {
                continue;
            }

            let block_id = firing.block_id();
            let lower = block_id == BlockId::Lower;
            if hdl64 && lower && laser_count < 64 {
                if self.latches.warn_hdl64 {
                    self.latches.warn_hdl64 = false;
                    raise(
                        &mut output.warnings,
                        Warning::UnsupportedHdl64Firing { laser_count },
                    );
                }
                continue;
            }

            let dual_firing = PacketSlice::is_dual_return_firing(block, dual, group);

            for slot in 0..LASERS_PER_FIRING {
                let raw_laser = block_id.laser_offset() + slot;
                let laser = if fold_lanes { slot % 16 } else { raw_laser };
                if laser >= laser_count {
                    if self.latches.warn_laser_range {
                        self.latches.warn_laser_range = false;
                        raise(
                            &mut output.warnings,
                            Warning::LaserIdOutOfRange {
                                laser_id: laser,
                                laser_count,
                            },
                        );
                    }
                    continue;
                }
                if !self.laser_mask[laser] {
                    continue;
                }

                let laser_return = firing.laser_return(slot);
                if self.config.ignore_zero_distances && laser_return.distance == 0 {
                    continue;
                }

                let point =
                    processor.decode(block, slot, laser, raw_laser, azimuth, lower, laser_return);
                let (distance, intensity) = (point.distance, point.intensity);
                let points = self.frame.points_mut();
                let index = points.push(point);

                if dual_firing {
                    match self.pairing.first_return(raw_laser) {
                        Some(first) => {
                            let first_return =
                                (points.distance()[first], points.intensity()[first]);
                            match resolve(first_return, (distance, intensity)) {
                                DualResolution::Doubled => {
                                    points.set_flags(first, DualFlags::DOUBLED);
                                    points.set_flags(index, DualFlags::DOUBLED);
                                }
                                DualResolution::Distinct {
                                    first: first_flags,
                                    second,
                                } => {
                                    points.set_flags(first, first_flags);
                                    points.set_flags(index, second);
                                    points.link(first, index);
                                }
                            }
                        }
                        None => points.set_flags(index, DualFlags::DOUBLED),
                    }
                }
                self.pairing.last_point[raw_laser] = Some(index);
            }
        }

        output
    }

    fn preprocess_packet(&mut self, packet: &RawPacket<'_>) -> Option<FrameInfo> {
        let slice = PacketSlice::from_slice(packet.data).ok()?;
        let raw_time = slice.raw_time();
        self.catalog.timestamps.compute(raw_time);

        let mut split = None;
        for block in 0..FIRINGS_PER_PACKET {
            if self.catalog.framing.observe(slice.firing(block).azimuth()) && split.is_none() {
                split = Some(block);
            }
        }

        let firing_to_skip = if !self.catalog.started {
            self.catalog.started = true;
            0
        } else {
            split?
        };

        Some(FrameInfo {
            file_position: packet.file_position,
            network_time: packet.network_time,
            first_raw_time: raw_time,
            firing_to_skip,
            rolling_count: self.catalog.timestamps.rolling_count(),
        })
    }

    fn split_frame(&mut self, force: bool) -> Option<Frame> {
        if !force && self.frame.is_empty() {
            return None;
        }
        self.pairing.reset();
        let frame = self.frame.finalize(self.rpm.rpm());
        debug!(
            "frame {} split with {} points",
            frame.frame_id(),
            frame.len()
        );
        Some(frame)
    }

    fn reset_current_frame(&mut self) {
        self.frame.discard();
        self.pairing.reset();
    }

    fn sensor_information(&self) -> String {
        let sensor = &self.sensor;
        format!(
            "{} ({} lasers), {}, power {}, factory bytes {} (0x{:02x}) {} (0x{:02x})",
            sensor.model,
            self.calibration.laser_count(),
            sensor.return_mode,
            sensor.power_mode,
            sensor.factory_field1,
            sensor.factory_field1,
            sensor.factory_field2,
            sensor.factory_field2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lidar::ReturnMode, synthetic::PacketBuilder};

    fn interpreter() -> LegacyInterpreter {
        LegacyInterpreter::with_calibration(
            InterpreterConfig::default(),
            Calibration::factory_default(SensorModel::Hdl32),
        )
        .unwrap()
    }

    fn process(interpreter: &mut LegacyInterpreter, packet: &[u8]) -> ProcessOutput {
        interpreter.process_packet(&RawPacket::new(packet))
    }

    #[test]
    fn test_rejected_packet_has_no_effect() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().fill(100, 1).build();
        let output = process(&mut interpreter, &packet[..100]);
        assert!(output.is_empty());
        assert_eq!(interpreter.pending_points(), 0);
        assert!(interpreter.latches.check_sensor);
    }

    #[test]
    fn test_points_per_block() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().sweep(0, 20).fill(500, 7).build();
        let output = process(&mut interpreter, &packet);
        assert!(output.frames.is_empty());
        assert_eq!(
            interpreter.pending_points(),
            FIRINGS_PER_PACKET * LASERS_PER_FIRING
        );
    }

    #[test]
    fn test_zero_distances_ignored() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().sweep(0, 20).laser(0, 0, 500, 1).build();
        process(&mut interpreter, &packet);
        assert_eq!(interpreter.pending_points(), 1);

        let config = InterpreterConfig {
            ignore_zero_distances: false,
            ..Default::default()
        };
        interpreter.reconfigure(config).unwrap();
        process(&mut interpreter, &packet);
        assert_eq!(
            interpreter.pending_points(),
            FIRINGS_PER_PACKET * LASERS_PER_FIRING
        );
    }

    #[test]
    fn test_firing_skip_and_disabled_lasers() {
        let config = InterpreterConfig {
            firing_skip: 1,
            disabled_lasers: vec![0, 1],
            ..Default::default()
        };
        let mut interpreter = LegacyInterpreter::with_calibration(
            config,
            Calibration::factory_default(SensorModel::Hdl32),
        )
        .unwrap();
        let packet = PacketBuilder::new().sweep(0, 20).fill(500, 7).build();
        process(&mut interpreter, &packet);
        assert_eq!(interpreter.pending_points(), 6 * 30);
    }

    #[test]
    fn test_split_block_starts_new_frame() {
        let mut interpreter = interpreter();
        let first = PacketBuilder::new().sweep(35_000, 40).fill(500, 7).build();
        // wraps at block 3
        let second = PacketBuilder::new()
            .sweep(35_880, 40)
            .fill(500, 7)
            .raw_time(1_000)
            .build();
        process(&mut interpreter, &first);
        let output = process(&mut interpreter, &second);

        assert_eq!(output.frames.len(), 1);
        assert_eq!(output.frames[0].len(), 15 * LASERS_PER_FIRING);
        assert_eq!(interpreter.pending_points(), 9 * LASERS_PER_FIRING);

        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.firing_to_skip(), 3);
        assert_eq!(frame.frame_id(), 1);
    }

    #[test]
    fn test_split_without_force_skips_empty() {
        let mut interpreter = interpreter();
        assert!(interpreter.split_frame(false).is_none());
        assert!(interpreter.split_frame(true).unwrap().is_empty());
    }

    #[test]
    fn test_reset_current_frame() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().sweep(0, 20).fill(500, 7).build();
        process(&mut interpreter, &packet);
        interpreter.reset_current_frame();
        assert_eq!(interpreter.pending_points(), 0);
        assert!(interpreter.split_frame(false).is_none());
    }

    #[test]
    fn test_dual_pairs_linked() {
        let mut interpreter = interpreter();
        let mut builder = PacketBuilder::new().return_mode(ReturnMode::Dual);
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.azimuth(block, (block / 2) as u16 * 20);
        }
        let packet = builder
            .laser(0, 5, 100, 30)
            .laser(1, 5, 200, 10)
            .laser(2, 6, 300, 40)
            .laser(3, 6, 300, 40)
            .build();
        process(&mut interpreter, &packet);

        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.dual_partner()[0], Some(1));
        assert_eq!(frame.dual_partner()[1], Some(0));
        assert_eq!(
            frame.flags()[0],
            DualFlags::DISTANCE_NEAR | DualFlags::INTENSITY_HIGH
        );
        assert_eq!(
            frame.flags()[1],
            DualFlags::DISTANCE_FAR | DualFlags::INTENSITY_LOW
        );
        assert_eq!(frame.flags()[2], DualFlags::DOUBLED);
        assert_eq!(frame.flags()[3], DualFlags::DOUBLED);
        assert_eq!(frame.dual_partner()[2], None);
    }

    #[test]
    fn test_dual_return_without_first() {
        let mut interpreter = interpreter();
        let mut builder = PacketBuilder::new().return_mode(ReturnMode::Dual);
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.azimuth(block, (block / 2) as u16 * 20);
        }
        let packet = builder.laser(1, 5, 200, 10).build();
        process(&mut interpreter, &packet);
        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.flags()[0], DualFlags::DOUBLED);
        assert_eq!(frame.dual_partner()[0], None);
    }

    /// Partners are mutual and share laser and azimuth.
    fn assert_partners_consistent(frame: &Frame) {
        for (index, partner) in frame.dual_partner().iter().enumerate() {
            if let Some(partner) = *partner {
                assert_eq!(frame.dual_partner()[partner], Some(index));
                assert_eq!(frame.raw_laser_id()[index], frame.raw_laser_id()[partner]);
                assert_eq!(frame.azimuth()[index], frame.azimuth()[partner]);
                assert_ne!(frame.flags()[index], frame.flags()[partner]);
            }
        }
    }

    #[test]
    fn test_firing_skip_keeps_pairs_within_a_group() {
        let mut builder = PacketBuilder::new().return_mode(ReturnMode::Dual);
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.azimuth(block, (block / 2) as u16 * 20);
        }
        let packet = builder
            .laser(0, 4, 100, 30)
            .laser(1, 4, 200, 10)
            .laser(3, 4, 400, 60)
            .laser(4, 4, 500, 20)
            .laser(5, 4, 600, 70)
            .build();

        let decode = |firing_skip: usize| {
            let config = InterpreterConfig {
                firing_skip,
                intra_firing_adjustment: false,
                ..Default::default()
            };
            let mut interpreter = LegacyInterpreter::with_calibration(
                config,
                Calibration::factory_default(SensorModel::Hdl32),
            )
            .unwrap();
            process(&mut interpreter, &packet);
            interpreter.split_frame(true).unwrap()
        };

        let frame = decode(0);
        assert_eq!(
            frame.dual_partner(),
            &[Some(1), Some(0), None, Some(4), Some(3)]
        );
        assert_eq!(frame.flags()[2], DualFlags::DOUBLED);
        assert_partners_consistent(&frame);

        // Only first returns are decoded
        let frame = decode(1);
        assert_eq!(frame.azimuth(), &[0, 40]);
        assert!(frame.dual_partner().iter().all(|p| p.is_none()));
        assert!(frame.flags().iter().all(|f| f.is_empty()));

        // Block 3 lost its first return to the skip
        let frame = decode(2);
        assert_eq!(frame.azimuth(), &[0, 20]);
        assert_eq!(frame.dual_partner(), &[None, None]);
        assert_eq!(frame.flags()[0], DualFlags::empty());
        assert_eq!(frame.flags()[1], DualFlags::DOUBLED);
        assert_partners_consistent(&frame);
    }

    #[test]
    fn test_vls128_dual_pairs_by_bank() {
        let mut interpreter = LegacyInterpreter::with_calibration(
            InterpreterConfig::default(),
            Calibration::factory_default(SensorModel::Vls128),
        )
        .unwrap();
        let banks = [BlockId::Upper, BlockId::Lower, BlockId::Bank2, BlockId::Bank3];
        let mut builder = PacketBuilder::new()
            .model_byte(0xa1)
            .return_mode(ReturnMode::Dual);
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder
                .block_id(block, banks[block % 4])
                .azimuth(block, (block / 8) as u16 * 20);
        }
        let packet = builder
            .laser(0, 0, 100, 30)
            .laser(1, 0, 150, 20)
            .laser(4, 0, 200, 10)
            .laser(5, 0, 300, 50)
            .build();

        let output = process(&mut interpreter, &packet);
        assert!(output.warnings.is_empty());
        let frame = interpreter.split_frame(true).unwrap();

        assert_eq!(frame.raw_laser_id(), &[0, 32, 0, 32]);
        assert_eq!(
            frame.dual_partner(),
            &[Some(2), Some(3), Some(0), Some(1)]
        );
        assert_eq!(
            frame.flags()[1],
            DualFlags::DISTANCE_NEAR | DualFlags::INTENSITY_LOW
        );
        assert_eq!(
            frame.flags()[3],
            DualFlags::DISTANCE_FAR | DualFlags::INTENSITY_HIGH
        );
        assert_partners_consistent(&frame);
    }

    /// HDL-64 dual layout: upper and lower blocks of both returns share
    /// an azimuth.
    fn hdl64_dual_packet() -> Vec<u8> {
        let mut builder = PacketBuilder::new().hdl64().factory_field1(b'H');
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.azimuth(block, (block / 4) as u16 * 18);
        }
        builder
            .laser(0, 4, 100, 30)
            .laser(1, 4, 150, 20)
            .laser(2, 4, 200, 10)
            .laser(3, 4, 150, 20)
            .build()
    }

    #[test]
    fn test_hdl64_dual_pairs_from_block_layout() {
        let mut interpreter = LegacyInterpreter::with_calibration(
            InterpreterConfig::default(),
            Calibration::factory_default(SensorModel::Hdl64),
        )
        .unwrap();
        let output = process(&mut interpreter, &hdl64_dual_packet());
        assert!(output.warnings.is_empty());
        assert_eq!(interpreter.sensor_state().return_mode, ReturnMode::Dual);

        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.raw_laser_id(), &[4, 36, 4, 36]);
        assert_eq!(frame.dual_partner(), &[Some(2), None, Some(0), None]);
        assert_eq!(
            frame.flags()[0],
            DualFlags::DISTANCE_NEAR | DualFlags::INTENSITY_HIGH
        );
        assert_eq!(frame.flags()[1], DualFlags::DOUBLED);
        assert_eq!(frame.flags()[3], DualFlags::DOUBLED);
        assert_partners_consistent(&frame);
    }

    #[test]
    fn test_return_mode_override() {
        let mut builder = PacketBuilder::new().return_mode(ReturnMode::Strongest);
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.azimuth(block, (block / 2) as u16 * 20);
        }
        let packet = builder.laser(0, 4, 100, 30).laser(1, 4, 200, 10).build();

        let config = InterpreterConfig {
            return_mode: Some(ReturnMode::Dual),
            ..Default::default()
        };
        let mut interpreter = LegacyInterpreter::with_calibration(
            config,
            Calibration::factory_default(SensorModel::Hdl32),
        )
        .unwrap();
        process(&mut interpreter, &packet);
        assert_eq!(interpreter.sensor_state().return_mode, ReturnMode::Dual);
        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.dual_partner(), &[Some(1), Some(0)]);

        // Forcing single return on a dual layout disables pairing
        let config = InterpreterConfig {
            return_mode: Some(ReturnMode::Strongest),
            ..Default::default()
        };
        let mut interpreter = LegacyInterpreter::with_calibration(
            config,
            Calibration::factory_default(SensorModel::Hdl64),
        )
        .unwrap();
        process(&mut interpreter, &hdl64_dual_packet());
        let frame = interpreter.split_frame(true).unwrap();
        assert!(frame.dual_partner().iter().all(|p| p.is_none()));
    }

    #[test]
    fn test_single_return_has_no_flags() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().sweep(0, 20).fill(500, 7).build();
        process(&mut interpreter, &packet);
        let frame = interpreter.split_frame(true).unwrap();
        assert!(frame.flags().iter().all(|f| f.is_empty()));
        assert!(frame.dual_partner().iter().all(|p| p.is_none()));
    }

    #[test]
    fn test_sensor_mismatch_warns_once() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().model_byte(0x22).fill(500, 1).build();
        let output = process(&mut interpreter, &packet);
        assert_eq!(
            output.warnings,
            vec![Warning::SensorMismatch {
                reported: SensorModel::Vlp16,
                calibrated: SensorModel::Hdl32,
            }]
        );
        assert!(process(&mut interpreter, &packet).warnings.is_empty());
        // the calibration is kept
        assert_eq!(interpreter.calibration().model(), SensorModel::Hdl32);

        interpreter.reset();
        assert_eq!(process(&mut interpreter, &packet).warnings.len(), 1);
    }

    #[test]
    fn test_unknown_reported_sensor() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new().model_byte(0x7f).build();
        let output = process(&mut interpreter, &packet);
        assert_eq!(output.warnings, vec![Warning::UnknownReportedSensor(0x7f)]);
    }

    #[test]
    fn test_no_check_without_calibration() {
        let mut interpreter = LegacyInterpreter::new(InterpreterConfig::default()).unwrap();
        let packet = PacketBuilder::new().model_byte(0x7f).fill(500, 1).build();
        assert!(process(&mut interpreter, &packet).warnings.is_empty());
    }

    #[test]
    fn test_hdl64_firing_with_32_lasers_warns_once() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new()
            .hdl64()
            .model_byte(0x00)
            .fill(500, 1)
            .build();
        let output = process(&mut interpreter, &packet);
        assert!(
            output
                .warnings
                .contains(&Warning::UnsupportedHdl64Firing { laser_count: 32 })
        );
        // only the upper half-blocks are decoded
        assert_eq!(interpreter.pending_points(), 6 * LASERS_PER_FIRING);

        let output = process(&mut interpreter, &packet);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_laser_out_of_range_warns_once() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new()
            .block_id(4, BlockId::Bank2)
            .fill(500, 1)
            .build();
        let output = process(&mut interpreter, &packet);
        assert_eq!(
            output.warnings,
            vec![Warning::LaserIdOutOfRange {
                laser_id: 64,
                laser_count: 32
            }]
        );
        assert_eq!(interpreter.pending_points(), 11 * LASERS_PER_FIRING);
    }

    #[test]
    fn test_accumulator_convergence_switches_calibration() {
        let mut interpreter = LegacyInterpreter::new(InterpreterConfig::default()).unwrap();
        let packet = PacketBuilder::new()
            .model_byte(0x22)
            .return_mode(ReturnMode::Strongest)
            .fill(500, 1)
            .build();
        process(&mut interpreter, &packet);
        assert_eq!(interpreter.calibration().model(), SensorModel::Unknown);
        assert_eq!(interpreter.calibration().laser_count(), 32);

        for _ in 0..crate::accumulator::CONVERGENCE_PACKETS {
            process(&mut interpreter, &packet);
        }
        assert_eq!(interpreter.sensor_state().model, SensorModel::Vlp16);
        assert_eq!(interpreter.calibration().laser_count(), 16);
        assert!(interpreter.sensor_information().starts_with("VLP-16 (16 lasers)"));
    }

    #[test]
    fn test_unit_calibration_follows_packet_shape() {
        let mut interpreter = LegacyInterpreter::new(InterpreterConfig::default()).unwrap();
        let packet = PacketBuilder::new()
            .hdl64()
            .model_byte(0x00)
            .fill(500, 1)
            .build();
        let output = process(&mut interpreter, &packet);
        assert!(output.warnings.is_empty());
        assert_eq!(interpreter.calibration().laser_count(), 64);
        assert_eq!(
            interpreter.pending_points(),
            FIRINGS_PER_PACKET * LASERS_PER_FIRING
        );
    }

    #[test]
    fn test_vlp16_lane_folding() {
        let mut interpreter = LegacyInterpreter::with_calibration(
            InterpreterConfig::default(),
            Calibration::factory_default(SensorModel::Vlp16),
        )
        .unwrap();
        let packet = PacketBuilder::new()
            .model_byte(0x22)
            .sweep(0, 40)
            .laser(0, 0, 500, 1)
            .laser(0, 16, 500, 1)
            .build();
        process(&mut interpreter, &packet);
        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.laser_id(), &[0, 0]);
        assert_eq!(frame.raw_laser_id(), &[0, 16]);
        // the second firing sequence is interpolated half way to the next block
        assert_eq!(frame.azimuth(), &[0, 20]);
        assert!(frame.timestamp()[1] > frame.timestamp()[0]);
    }

    #[test]
    fn test_sensor_information() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new()
            .return_mode(ReturnMode::Dual)
            .model_byte(0x21)
            .build();
        process(&mut interpreter, &packet);
        assert_eq!(
            interpreter.sensor_information(),
            "HDL-32E (32 lasers), dual return, power normal, factory bytes 57 (0x39) 33 (0x21)"
        );
    }

    #[test]
    fn test_preprocess_catalog() {
        let mut interpreter = interpreter();
        let first = PacketBuilder::new().sweep(35_000, 40).build();
        let second = PacketBuilder::new().sweep(35_880, 40).build();

        let entry = interpreter
            .preprocess_packet(&RawPacket::new(&first).with_file_position(0))
            .unwrap();
        assert_eq!(entry.firing_to_skip, 0);
        assert_eq!(entry.file_position, Some(0));

        let entry = interpreter
            .preprocess_packet(&RawPacket::new(&second).with_file_position(1206))
            .unwrap();
        assert_eq!(entry.firing_to_skip, 3);
        assert_eq!(entry.file_position, Some(1206));

        assert!(
            interpreter
                .preprocess_packet(&RawPacket::new(&first[..10]))
                .is_none()
        );
        // decoding state untouched
        assert_eq!(interpreter.pending_points(), 0);
    }

    #[test]
    fn test_resume_skips_previous_frame_firings() {
        let mut interpreter = interpreter();
        let packet = PacketBuilder::new()
            .sweep(35_880, 40)
            .fill(500, 7)
            .raw_time(5_000)
            .build();
        let info = FrameInfo {
            first_raw_time: 5_000,
            firing_to_skip: 3,
            rolling_count: 2,
            ..Default::default()
        };
        interpreter.resume_from(&info);
        let output = process(&mut interpreter, &packet);
        assert!(output.frames.is_empty());

        let frame = interpreter.split_frame(true).unwrap();
        assert_eq!(frame.len(), 9 * LASERS_PER_FIRING);
        assert_eq!(frame.firing_to_skip(), 3);
        assert_eq!(frame.rolling_count(), 2);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Decoding of one laser return into a [`Point`].
//!
//! The [`FiringProcessor`] holds everything that is constant across a
//! packet (calibration, variant, packet timestamp, azimuth step) and turns
//! individual laser returns into points: calibrated geometry, optional
//! HDL-64 intensity correction and intra-firing azimuth/time adjustment.
//! Dual-return pairing is left to the caller since it depends on the
//! previous firing of the same laser.

use crate::{
    calibration::{Calibration, FiringTiming, LaserCorrection, SensorVariant},
    dual_return::DualFlags,
    frame::Point,
    packet::{FIRINGS_PER_PACKET, LaserReturn, PacketSlice},
};

/// Azimuth units per revolution
pub const AZIMUTH_RANGE: i32 = 36_000;

/// Calibrated position of one return.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Corrected distance, meters
    pub distance: f64,
}

/// Project a return into sensor coordinates.
///
/// `azimuth` is in hundredths of a degree, `vertical_trig` is the
/// precomputed (sin, cos) of the laser's vertical correction.
pub fn compute_position(
    correction: &LaserCorrection,
    vertical_trig: (f64, f64),
    raw_distance: u16,
    distance_resolution: f64,
    azimuth: u16,
) -> Position {
    let (sin_v, cos_v) = vertical_trig;
    let distance = raw_distance as f64 * distance_resolution + correction.distance_correction;

    let angle = (azimuth as f64 / 100.0 - correction.rotational_correction).to_radians();
    let (sin_a, cos_a) = angle.sin_cos();

    let xy = distance * cos_v - correction.vertical_offset * sin_v;
    Position {
        x: xy * sin_a - correction.horizontal_offset * cos_a,
        y: xy * cos_a + correction.horizontal_offset * sin_a,
        z: distance * sin_v + correction.vertical_offset * cos_v,
        distance,
    }
}

/// HDL-64 focal intensity correction.
///
/// Returns the raw intensity unchanged when the laser has no usable
/// intensity range.
pub fn correct_intensity(correction: &LaserCorrection, raw_distance: u16, raw_intensity: u8) -> u8 {
    let min = correction.min_intensity as f64;
    let max = correction.max_intensity as f64;
    if max <= min {
        return raw_intensity;
    }

    let focal_offset = 256.0 * (1.0 - correction.focal_distance / 13_100.0).powi(2);
    let distance_term = 256.0 * (1.0 - raw_distance as f64 / 65_535.0).powi(2);
    let corrected =
        raw_intensity as f64 + correction.focal_slope * (focal_offset - distance_term).abs();

    let clamped = corrected.clamp(min, max);
    ((clamped - min) / (max - min) * 255.0).round() as u8
}

/// Typical azimuth step between consecutive firing blocks of a packet.
///
/// Upper median of the block deltas, skipping blocks whose azimuth is
/// out of range. On HDL-64 upper and lower half-blocks share an azimuth,
/// so the largest delta is used instead.
pub fn azimuth_step(packet: &PacketSlice<'_>, hdl64: bool) -> u16 {
    let mut diffs = [0i32; FIRINGS_PER_PACKET - 1];
    let mut count = 0;
    for i in 0..FIRINGS_PER_PACKET - 1 {
        let current = packet.firing(i).azimuth() as i32;
        let next = packet.firing(i + 1).azimuth() as i32;
        // Corrupt azimuths say nothing about the rotation speed
        if current >= AZIMUTH_RANGE || next >= AZIMUTH_RANGE {
            continue;
        }
        diffs[count] = (next - current).rem_euclid(AZIMUTH_RANGE);
        count += 1;
    }
    if count == 0 {
        return 0;
    }

    let diffs = &mut diffs[..count];
    diffs.sort_unstable();
    let step = if hdl64 {
        diffs[count - 1]
    } else {
        diffs[(count / 2 + 1).min(count - 1)]
    };
    step as u16
}

/// Per-packet decode context.
#[derive(Debug)]
pub struct FiringProcessor<'a> {
    pub calibration: &'a Calibration,
    pub variant: SensorVariant,
    /// Absolute packet time, microseconds
    pub packet_time: f64,
    /// Raw time-of-hour of the packet, microseconds
    pub raw_time: u32,
    pub dual: bool,
    pub hdl64: bool,
    /// Azimuth step between firing times, hundredths of a degree
    pub azimuth_step: u16,
    pub intensity_correction: bool,
    pub intra_firing_adjustment: bool,
}

impl FiringProcessor<'_> {
    /// Azimuth and time offsets of `slot` within firing `block`.
    ///
    /// Returns (azimuth adjustment in hundredths of a degree, time offset
    /// in microseconds relative to the packet time).
    pub fn intra_firing(&self, block: usize, slot: usize) -> (i32, f64) {
        let timing = self.variant.timing;
        let offset = timing.offset_us(block, slot, self.dual);
        if !self.intra_firing_adjustment || timing == FiringTiming::Uniform {
            return (0, offset);
        }

        let start = timing.offset_us(block, 0, self.dual);
        let next = timing.offset_us(block + timing.block_stride(self.dual), 0, self.dual);
        let span = next - start;
        if span <= 0.0 {
            return (0, offset);
        }

        let adjust = (self.azimuth_step as f64 * (offset - start) / span).round() as i32;
        (adjust, offset)
    }

    /// Decode one laser return.
    ///
    /// `laser` is the calibrated laser id, `raw_laser` the id addressed by
    /// the packet. `slot` is the position within the block and drives the
    /// firing timing. The caller has already validated `laser` against
    /// the calibration.
    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        &self,
        block: usize,
        slot: usize,
        laser: usize,
        raw_laser: usize,
        block_azimuth: u16,
        lower_block: bool,
        laser_return: LaserReturn,
    ) -> Point {
        let correction = self.calibration.laser(laser);

        let mut azimuth = block_azimuth as i32;
        if self.hdl64 && lower_block {
            azimuth += self.variant.half_block_azimuth_offset;
        }
        let (adjust, time_offset) = self.intra_firing(block, slot);
        let azimuth = (azimuth + adjust).rem_euclid(AZIMUTH_RANGE) as u16;

        let position = compute_position(
            correction,
            self.calibration.vertical_trig(laser),
            laser_return.distance,
            self.variant.distance_resolution,
            azimuth,
        );

        let intensity = if self.intensity_correction {
            correct_intensity(correction, laser_return.distance, laser_return.intensity)
        } else {
            laser_return.intensity
        };

        let raw_time =
            (self.raw_time as i64 + time_offset.round() as i64).clamp(0, u32::MAX as i64);

        Point {
            x: position.x,
            y: position.y,
            z: position.z,
            intensity,
            laser_id: laser as u8,
            raw_laser_id: raw_laser as u8,
            azimuth,
            distance: position.distance,
            distance_raw: laser_return.distance,
            vertical_angle: correction.vertical_correction,
            timestamp: (self.packet_time + time_offset) * 1e-6,
            raw_time: raw_time as u32,
            flags: DualFlags::empty(),
            dual_partner: None,
        }
    }
}

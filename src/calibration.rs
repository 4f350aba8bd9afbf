// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Calibration descriptions and sensor variants.
//!
//! Every supported sensor is described by a [`SensorVariant`] value: laser
//! count, distance resolution, intra-block firing timing and, for HDL-64,
//! the fixed azimuth offset of the lower half-block. One generic decode
//! path in [`crate::interpreter`] consumes the variant.
//!
//! A [`Calibration`] carries the per-laser corrections. It is built by the
//! caller, taken from factory default tables, or left as a unit
//! calibration while the sensor identity is still being inferred.

use crate::{
    lidar::{Error, PowerMode, SensorModel},
    packet::MAX_LASERS,
};
use serde::{Deserialize, Serialize};

/// Azimuth offset of the HDL-64 lower half-block, hundredths of a degree
pub const HDL64_LOWER_BLOCK_AZIMUTH_OFFSET: i32 = 9;

/// Factory vertical angles, degrees
const HDL32_VERTICAL: [f64; 32] = [
    -30.67, -9.33, -29.33, -8.00, -28.00, -6.67, -26.67, -5.33, -25.33, -4.00, -24.00, -2.67,
    -22.67, -1.33, -21.33, 0.00, -20.00, 1.33, -18.67, 2.67, -17.33, 4.00, -16.00, 5.33, -14.67,
    6.67, -13.33, 8.00, -12.00, 9.33, -10.67, 10.67,
];

const VLP16_VERTICAL: [f64; 16] = [
    -15.0, 1.0, -13.0, 3.0, -11.0, 5.0, -9.0, 7.0, -7.0, 9.0, -5.0, 11.0, -3.0, 13.0, -1.0, 15.0,
];

const VLP16_HIRES_VERTICAL: [f64; 16] = [
    -10.0, 0.67, -8.67, 2.0, -7.33, 3.33, -6.0, 4.67, -4.67, 6.0, -3.33, 7.33, -2.0, 8.67, -0.67,
    10.0,
];

const VLP32_VERTICAL: [f64; 32] = [
    -25.0, -1.0, -1.667, -15.639, -11.31, 0.0, -0.667, -8.843, -7.254, 0.333, -0.333, -6.148,
    -5.333, 1.333, 0.667, -4.0, -4.667, 1.667, 1.0, -3.667, -3.333, 3.333, 2.333, -2.667, -3.0,
    7.0, 4.667, -2.333, -2.0, 15.0, 10.333, -1.333,
];

/// Intra-block firing timing of a sensor family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiringTiming {
    /// 1.152 µs per laser, 46.08 µs per block, packet stamped at the end
    Hdl32,
    /// Two 16-laser sequences per block, 2.304 µs per laser
    Vlp16,
    /// Lasers fire in pairs, 2.304 µs per pair, 55.296 µs per block
    Vlp32,
    /// Upper and lower half-blocks fire together, 48 µs per pair
    Hdl64,
    /// No per-laser timing known
    Uniform,
}

impl FiringTiming {
    /// Time offset in microseconds of slot `slot` in firing block `block`,
    /// relative to the packet timestamp.
    pub fn offset_us(&self, block: usize, slot: usize, dual: bool) -> f64 {
        match self {
            FiringTiming::Hdl32 => {
                let sequence = if dual { block / 2 } else { block };
                -(46.08 * (12.0 - sequence as f64)) + slot as f64 * 1.152
            }
            FiringTiming::Vlp16 => {
                let sequence = if dual { block / 2 } else { block };
                110.592 * sequence as f64 + (slot % 16) as f64 * 2.304 + (slot / 16) as f64 * 55.296
            }
            FiringTiming::Vlp32 => {
                let sequence = if dual { block / 2 } else { block };
                55.296 * sequence as f64 + (slot / 2) as f64 * 2.304
            }
            FiringTiming::Hdl64 => {
                let sequence = if dual { block / 4 } else { block / 2 };
                48.0 * sequence as f64 + slot as f64 * 1.5
            }
            FiringTiming::Uniform => 0.0,
        }
    }

    /// Number of blocks between two distinct firing times.
    pub fn block_stride(&self, dual: bool) -> usize {
        match (self, dual) {
            (FiringTiming::Hdl64, false) => 2,
            (FiringTiming::Hdl64, true) => 4,
            (_, false) => 1,
            (_, true) => 2,
        }
    }
}

/// Closed set of sensor shapes consumed by the decoder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorVariant {
    pub laser_count: usize,
    /// Meters per raw distance unit
    pub distance_resolution: f64,
    pub timing: FiringTiming,
    /// Azimuth offset applied to lower half-block firings, hundredths of a degree
    pub half_block_azimuth_offset: i32,
    pub supports_dual_return: bool,
}

impl SensorVariant {
    pub fn for_model(model: SensorModel) -> Self {
        match model {
            SensorModel::Hdl32 => Self {
                laser_count: 32,
                distance_resolution: 0.002,
                timing: FiringTiming::Hdl32,
                half_block_azimuth_offset: 0,
                supports_dual_return: true,
            },
            SensorModel::Vlp16 | SensorModel::Vlp16HiRes => Self {
                laser_count: 16,
                distance_resolution: 0.002,
                timing: FiringTiming::Vlp16,
                half_block_azimuth_offset: 0,
                supports_dual_return: true,
            },
            SensorModel::Vlp32Ab | SensorModel::Vlp32C => Self {
                laser_count: 32,
                distance_resolution: 0.004,
                timing: FiringTiming::Vlp32,
                half_block_azimuth_offset: 0,
                supports_dual_return: true,
            },
            SensorModel::Hdl64 => Self {
                laser_count: 64,
                distance_resolution: 0.002,
                timing: FiringTiming::Hdl64,
                half_block_azimuth_offset: HDL64_LOWER_BLOCK_AZIMUTH_OFFSET,
                supports_dual_return: true,
            },
            SensorModel::Vls128 => Self {
                laser_count: 128,
                distance_resolution: 0.004,
                timing: FiringTiming::Uniform,
                half_block_azimuth_offset: 0,
                supports_dual_return: true,
            },
            SensorModel::Unknown => Self::unit(32),
        }
    }

    /// Best-effort shape for an unidentified sensor.
    pub fn unit(laser_count: usize) -> Self {
        Self {
            laser_count,
            distance_resolution: 0.002,
            timing: FiringTiming::Uniform,
            half_block_azimuth_offset: if laser_count == 64 {
                HDL64_LOWER_BLOCK_AZIMUTH_OFFSET
            } else {
                0
            },
            supports_dual_return: true,
        }
    }
}

/// Per-laser correction parameters.
///
/// Angles are in degrees, lengths in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserCorrection {
    pub vertical_correction: f64,
    pub rotational_correction: f64,
    pub distance_correction: f64,
    pub vertical_offset: f64,
    pub horizontal_offset: f64,
    pub min_intensity: u8,
    pub max_intensity: u8,
    pub focal_distance: f64,
    pub focal_slope: f64,
}

impl LaserCorrection {
    pub fn with_vertical(vertical_correction: f64) -> Self {
        Self {
            vertical_correction,
            max_intensity: 255,
            ..Default::default()
        }
    }

    fn is_finite(&self) -> bool {
        [
            self.vertical_correction,
            self.rotational_correction,
            self.distance_correction,
            self.vertical_offset,
            self.horizontal_offset,
            self.focal_distance,
            self.focal_slope,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Calibration description supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    model: SensorModel,
    lasers: Vec<LaserCorrection>,
    power_mode: PowerMode,
    /// (sin, cos) of each vertical correction
    vertical_trig: Vec<(f64, f64)>,
}

impl Calibration {
    /// Validate and build a calibration for `model`.
    ///
    /// For a known model the laser count must match the model; for
    /// [`SensorModel::Unknown`] any count from 1 to 128 is accepted.
    pub fn new(model: SensorModel, lasers: Vec<LaserCorrection>) -> Result<Self, Error> {
        if lasers.is_empty() || lasers.len() > MAX_LASERS {
            return Err(Error::Calibration(format!(
                "{} lasers, expected 1 to {}",
                lasers.len(),
                MAX_LASERS
            )));
        }
        if model != SensorModel::Unknown && lasers.len() != model.laser_count() {
            return Err(Error::Calibration(format!(
                "{} has {} lasers, calibration describes {}",
                model,
                model.laser_count(),
                lasers.len()
            )));
        }
        if let Some(laser) = lasers.iter().position(|l| !l.is_finite()) {
            return Err(Error::Calibration(format!(
                "laser {} has a non-finite correction",
                laser
            )));
        }

        let vertical_trig = lasers
            .iter()
            .map(|l| l.vertical_correction.to_radians().sin_cos())
            .collect();

        Ok(Self {
            model,
            lasers,
            power_mode: PowerMode::Unknown,
            vertical_trig,
        })
    }

    /// Factory vertical angles for `model`, other corrections zero.
    pub fn factory_default(model: SensorModel) -> Self {
        let angles: Vec<f64> = match model {
            SensorModel::Hdl32 => HDL32_VERTICAL.to_vec(),
            SensorModel::Vlp16 => VLP16_VERTICAL.to_vec(),
            SensorModel::Vlp16HiRes => VLP16_HIRES_VERTICAL.to_vec(),
            SensorModel::Vlp32Ab | SensorModel::Vlp32C => VLP32_VERTICAL.to_vec(),
            SensorModel::Hdl64 => (0..64)
                .map(|laser| {
                    if laser < 32 {
                        2.0 - laser as f64 * (10.33 / 31.0)
                    } else {
                        -8.83 - (laser - 32) as f64 * (15.5 / 31.0)
                    }
                })
                .collect(),
            SensorModel::Vls128 => (0..128)
                .map(|laser| -25.0 + laser as f64 * (40.0 / 127.0))
                .collect(),
            SensorModel::Unknown => vec![0.0; 32],
        };
        let lasers = angles.into_iter().map(LaserCorrection::with_vertical).collect();
        let mut calibration = Self::build_unchecked(model, lasers);
        calibration.power_mode = PowerMode::Normal;
        calibration
    }

    /// All corrections zero, used until the sensor identity is known.
    pub fn unit(laser_count: usize) -> Self {
        let laser_count = laser_count.clamp(1, MAX_LASERS);
        Self::build_unchecked(
            SensorModel::Unknown,
            vec![LaserCorrection::with_vertical(0.0); laser_count],
        )
    }

    fn build_unchecked(model: SensorModel, lasers: Vec<LaserCorrection>) -> Self {
        let vertical_trig = lasers
            .iter()
            .map(|l| l.vertical_correction.to_radians().sin_cos())
            .collect();
        Self {
            model,
            lasers,
            power_mode: PowerMode::Unknown,
            vertical_trig,
        }
    }

    pub fn with_power_mode(mut self, power_mode: PowerMode) -> Self {
        self.power_mode = power_mode;
        self
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub fn laser_count(&self) -> usize {
        self.lasers.len()
    }

    pub fn lasers(&self) -> &[LaserCorrection] {
        &self.lasers
    }

    #[inline]
    pub fn laser(&self, laser: usize) -> &LaserCorrection {
        &self.lasers[laser]
    }

    /// (sin, cos) of the vertical correction of `laser`.
    #[inline]
    pub fn vertical_trig(&self, laser: usize) -> (f64, f64) {
        self.vertical_trig[laser]
    }

    /// Decoder shape described by this calibration.
    pub fn variant(&self) -> SensorVariant {
        match self.model {
            SensorModel::Unknown => SensorVariant::unit(self.laser_count()),
            model => SensorVariant::for_model(model),
        }
    }
}

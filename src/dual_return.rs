// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Dual-return classification.
//!
//! In dual-return mode the sensor reports two returns per laser and
//! azimuth in consecutive firing blocks. Each return of a pair is tagged
//! nearer or farther, and higher or lower intensity. The two groups are
//! independent bits, and a group stays empty when both returns tie on it.
//! A pair that is numerically identical is a single return duplicated by
//! the sensor and both returns are tagged [`DualFlags::DOUBLED`].

use bitflags::bitflags;
use std::cmp::Ordering;

/// Distances closer than this are treated as identical, meters
pub const DOUBLED_DISTANCE_TOLERANCE: f64 = 1e-6;

bitflags! {
    /// Dual-return classification of a point
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DualFlags: u8 {
        /// Return with the lesser distance
        const DISTANCE_NEAR = 0x1;
        /// Return with the greater distance
        const DISTANCE_FAR = 0x2;
        /// Return with the greater intensity
        const INTENSITY_HIGH = 0x4;
        /// Return with the lesser intensity
        const INTENSITY_LOW = 0x8;

        const DISTANCE_MASK = Self::DISTANCE_NEAR.bits() | Self::DISTANCE_FAR.bits();
        const INTENSITY_MASK = Self::INTENSITY_HIGH.bits() | Self::INTENSITY_LOW.bits();
        /// Single return reported twice
        const DOUBLED = Self::DISTANCE_MASK.bits() | Self::INTENSITY_MASK.bits();
    }
}

impl DualFlags {
    /// -1 near, 1 far, 0 unclassified.
    pub fn distance_flag(&self) -> i8 {
        let distance = *self & DualFlags::DISTANCE_MASK;
        if distance == DualFlags::DISTANCE_NEAR {
            -1
        } else if distance == DualFlags::DISTANCE_FAR {
            1
        } else {
            0
        }
    }

    /// 1 high, -1 low, 0 unclassified.
    pub fn intensity_flag(&self) -> i8 {
        let intensity = *self & DualFlags::INTENSITY_MASK;
        if intensity == DualFlags::INTENSITY_HIGH {
            1
        } else if intensity == DualFlags::INTENSITY_LOW {
            -1
        } else {
            0
        }
    }
}

/// Outcome of comparing the two returns of a dual pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DualResolution {
    /// Same distance and intensity: both returns are the same echo
    Doubled,
    /// Distinct returns with their classifications
    Distinct { first: DualFlags, second: DualFlags },
}

/// Classify a pair of returns of the same laser and azimuth.
///
/// `first` is the return from the earlier firing block. Distances are
/// corrected distances in meters.
pub fn resolve(first: (f64, u8), second: (f64, u8)) -> DualResolution {
    let (first_distance, first_intensity) = first;
    let (second_distance, second_intensity) = second;

    let same_distance = (first_distance - second_distance).abs() <= DOUBLED_DISTANCE_TOLERANCE;
    if same_distance && first_intensity == second_intensity {
        return DualResolution::Doubled;
    }

    let (intensity_a, intensity_b) = match first_intensity.cmp(&second_intensity) {
        Ordering::Less => (DualFlags::INTENSITY_LOW, DualFlags::INTENSITY_HIGH),
        Ordering::Greater => (DualFlags::INTENSITY_HIGH, DualFlags::INTENSITY_LOW),
        Ordering::Equal => (DualFlags::empty(), DualFlags::empty()),
    };

    let (distance_a, distance_b) = if same_distance {
        (DualFlags::empty(), DualFlags::empty())
    } else if first_distance < second_distance {
        (DualFlags::DISTANCE_NEAR, DualFlags::DISTANCE_FAR)
    } else {
        (DualFlags::DISTANCE_FAR, DualFlags::DISTANCE_NEAR)
    };

    DualResolution::Distinct {
        first: distance_a | intensity_a,
        second: distance_b | intensity_b,
    }
}

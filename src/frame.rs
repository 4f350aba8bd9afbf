// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Completed frames and frame catalog entries.

use crate::{buffer::PointColumns, dual_return::DualFlags};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// One decoded return.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: u8,
    /// Calibrated laser id
    pub laser_id: u8,
    /// Laser id as addressed by the packet (slot + block offset)
    pub raw_laser_id: u8,
    /// Corrected azimuth, hundredths of a degree
    pub azimuth: u16,
    /// Corrected distance, meters
    pub distance: f64,
    pub distance_raw: u16,
    /// Vertical angle, degrees
    pub vertical_angle: f64,
    /// Absolute timestamp, seconds
    pub timestamp: f64,
    /// Adjusted hardware time-of-hour, microseconds
    pub raw_time: u32,
    pub flags: DualFlags,
    /// Index of the other return of a dual pair in the same frame
    pub dual_partner: Option<usize>,
}

impl Point {
    pub fn distance_flag(&self) -> i8 {
        self.flags.distance_flag()
    }

    pub fn intensity_flag(&self) -> i8 {
        self.flags.intensity_flag()
    }
}

/// Catalog entry describing where a frame starts.
///
/// Produced by the preprocessing pass and carried by every [`Frame`]; feed
/// it back to [`crate::interpreter::LegacyInterpreter::resume_from`] to
/// decode from that frame onwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Capture file offset of the packet holding the first firing
    pub file_position: Option<u64>,
    /// Network arrival time of that packet, seconds
    pub network_time: Option<f64>,
    /// Hardware time-of-hour of that packet, microseconds
    pub first_raw_time: u32,
    /// Leading firing blocks of that packet belonging to the previous frame
    pub firing_to_skip: usize,
    /// Time counter rollovers seen before that packet
    pub rolling_count: u32,
}

/// A completed rotation.
///
/// Columnar point table plus frame metadata. Owned by the caller once
/// emitted.
#[derive(Clone, Debug)]
pub struct Frame {
    frame_id: u32,
    info: FrameInfo,
    rpm: f64,
    points: PointColumns,
}

impl Frame {
    pub(crate) fn new(frame_id: u32, info: FrameInfo, rpm: f64, points: PointColumns) -> Self {
        Self {
            frame_id,
            info,
            rpm,
            points,
        }
    }

    /// Frame sequence number (wraps at u32::MAX)
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn firing_to_skip(&self) -> usize {
        self.info.firing_to_skip
    }

    pub fn rolling_count(&self) -> u32 {
        self.info.rolling_count
    }

    /// Rotation speed estimate at the time the frame completed
    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    pub fn points(&self) -> &PointColumns {
        &self.points
    }

    pub fn into_points(self) -> PointColumns {
        self.points
    }
}

impl Deref for Frame {
    type Target = PointColumns;

    fn deref(&self) -> &PointColumns {
        &self.points
    }
}

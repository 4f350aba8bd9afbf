// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Columnar point storage and frame assembly.
//!
//! Points are stored in a structure-of-arrays layout: every attribute has
//! its own vector and all vectors share the same length. The
//! [`FrameBuilder`] owns the columns of the frame in progress and hands
//! them to the caller as an immutable [`Frame`] on split, replacing them
//! with freshly reserved columns.
//!
//! # Example
//!
//! ```
//! use edgefirst_velodyne::buffer::FrameBuilder;
//! use edgefirst_velodyne::frame::{FrameInfo, Point};
//!
//! let mut builder = FrameBuilder::new(1024);
//! builder.begin(FrameInfo::default());
//! builder.points_mut().push(Point { x: 1.0, ..Default::default() });
//!
//! let frame = builder.finalize(0.0);
//! assert_eq!(frame.len(), 1);
//! assert_eq!(frame.x()[0], 1.0);
//! assert!(builder.is_empty());
//! ```

use crate::{
    dual_return::DualFlags,
    frame::{Frame, FrameInfo, Point},
};

/// Parallel point attribute arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointColumns {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    intensity: Vec<u8>,
    laser_id: Vec<u8>,
    raw_laser_id: Vec<u8>,
    azimuth: Vec<u16>,
    distance: Vec<f64>,
    distance_raw: Vec<u16>,
    vertical_angle: Vec<f64>,
    timestamp: Vec<f64>,
    raw_time: Vec<u32>,
    flags: Vec<DualFlags>,
    dual_partner: Vec<Option<usize>>,
}

impl PointColumns {
    /// Reserve room for `capacity` points in every column.
    ///
    /// Columns grow past the reservation if a frame is larger.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
            laser_id: Vec::with_capacity(capacity),
            raw_laser_id: Vec::with_capacity(capacity),
            azimuth: Vec::with_capacity(capacity),
            distance: Vec::with_capacity(capacity),
            distance_raw: Vec::with_capacity(capacity),
            vertical_angle: Vec::with_capacity(capacity),
            timestamp: Vec::with_capacity(capacity),
            raw_time: Vec::with_capacity(capacity),
            flags: Vec::with_capacity(capacity),
            dual_partner: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.x.capacity()
    }

    /// Clear all points while retaining capacity
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.intensity.clear();
        self.laser_id.clear();
        self.raw_laser_id.clear();
        self.azimuth.clear();
        self.distance.clear();
        self.distance_raw.clear();
        self.vertical_angle.clear();
        self.timestamp.clear();
        self.raw_time.clear();
        self.flags.clear();
        self.dual_partner.clear();
    }

    /// Append a point, returning its index.
    #[inline]
    pub fn push(&mut self, point: Point) -> usize {
        let index = self.len();
        self.x.push(point.x);
        self.y.push(point.y);
        self.z.push(point.z);
        self.intensity.push(point.intensity);
        self.laser_id.push(point.laser_id);
        self.raw_laser_id.push(point.raw_laser_id);
        self.azimuth.push(point.azimuth);
        self.distance.push(point.distance);
        self.distance_raw.push(point.distance_raw);
        self.vertical_angle.push(point.vertical_angle);
        self.timestamp.push(point.timestamp);
        self.raw_time.push(point.raw_time);
        self.flags.push(point.flags);
        self.dual_partner.push(point.dual_partner);
        index
    }

    pub fn set_flags(&mut self, index: usize, flags: DualFlags) {
        self.flags[index] = flags;
    }

    /// Record `a` and `b` as the two returns of a dual pair.
    pub fn link(&mut self, a: usize, b: usize) {
        self.dual_partner[a] = Some(b);
        self.dual_partner[b] = Some(a);
    }

    /// Row view of point `index`.
    pub fn point(&self, index: usize) -> Option<Point> {
        if index >= self.len() {
            return None;
        }
        Some(Point {
            x: self.x[index],
            y: self.y[index],
            z: self.z[index],
            intensity: self.intensity[index],
            laser_id: self.laser_id[index],
            raw_laser_id: self.raw_laser_id[index],
            azimuth: self.azimuth[index],
            distance: self.distance[index],
            distance_raw: self.distance_raw[index],
            vertical_angle: self.vertical_angle[index],
            timestamp: self.timestamp[index],
            raw_time: self.raw_time[index],
            flags: self.flags[index],
            dual_partner: self.dual_partner[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).filter_map(move |i| self.point(i))
    }

    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    #[inline]
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    #[inline]
    pub fn intensity(&self) -> &[u8] {
        &self.intensity
    }

    #[inline]
    pub fn laser_id(&self) -> &[u8] {
        &self.laser_id
    }

    #[inline]
    pub fn raw_laser_id(&self) -> &[u8] {
        &self.raw_laser_id
    }

    /// Corrected azimuths, hundredths of a degree
    #[inline]
    pub fn azimuth(&self) -> &[u16] {
        &self.azimuth
    }

    /// Corrected distances, meters
    #[inline]
    pub fn distance(&self) -> &[f64] {
        &self.distance
    }

    #[inline]
    pub fn distance_raw(&self) -> &[u16] {
        &self.distance_raw
    }

    #[inline]
    pub fn vertical_angle(&self) -> &[f64] {
        &self.vertical_angle
    }

    /// Absolute timestamps, seconds
    #[inline]
    pub fn timestamp(&self) -> &[f64] {
        &self.timestamp
    }

    #[inline]
    pub fn raw_time(&self) -> &[u32] {
        &self.raw_time
    }

    #[inline]
    pub fn flags(&self) -> &[DualFlags] {
        &self.flags
    }

    #[inline]
    pub fn dual_partner(&self) -> &[Option<usize>] {
        &self.dual_partner
    }

    /// -1 near, 1 far, 0 unclassified, per point
    pub fn distance_flags(&self) -> impl Iterator<Item = i8> + '_ {
        self.flags.iter().map(|f| f.distance_flag())
    }

    /// 1 high, -1 low, 0 unclassified, per point
    pub fn intensity_flags(&self) -> impl Iterator<Item = i8> + '_ {
        self.flags.iter().map(|f| f.intensity_flag())
    }
}

/// Owner of the frame in progress.
#[derive(Debug)]
pub struct FrameBuilder {
    points: PointColumns,
    reserve: usize,
    next_frame_id: u32,
    info: Option<FrameInfo>,
}

impl FrameBuilder {
    /// `reserve` is the typical points-per-frame reservation.
    pub fn new(reserve: usize) -> Self {
        Self {
            points: PointColumns::with_capacity(reserve),
            reserve,
            next_frame_id: 0,
            info: None,
        }
    }

    /// Record where the frame in progress starts. Ignored once set.
    pub fn begin(&mut self, info: FrameInfo) {
        if self.info.is_none() {
            self.info = Some(info);
        }
    }

    pub fn is_started(&self) -> bool {
        self.info.is_some()
    }

    #[inline]
    pub fn points(&self) -> &PointColumns {
        &self.points
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut PointColumns {
        &mut self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sequence number the next finalized frame will carry.
    pub fn next_frame_id(&self) -> u32 {
        self.next_frame_id
    }

    /// Hand the accumulated points over as a [`Frame`] and start afresh.
    pub fn finalize(&mut self, rpm: f64) -> Frame {
        let points = std::mem::replace(&mut self.points, PointColumns::with_capacity(self.reserve));
        let info = self.info.take().unwrap_or_default();
        let frame = Frame::new(self.next_frame_id, info, rpm, points);
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        frame
    }

    /// Drop the frame in progress without emitting it.
    pub fn discard(&mut self) {
        self.points.clear();
        self.info = None;
    }

    /// Drop the frame in progress and restart numbering.
    pub fn reset(&mut self) {
        self.discard();
        self.next_frame_id = 0;
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Absolute timestamps from the hardware time-of-hour counter.
//!
//! The sensor stamps each packet with microseconds past the hour, which
//! rolls over every [`MAX_TIME_BEFORE_ROLLING`] microseconds. The
//! [`TimestampEngine`] counts rollovers so that timestamps keep increasing
//! across hours. A decrease larger than half the range is a rollover;
//! smaller decreases are reordering jitter and leave the count untouched.

use std::collections::VecDeque;

/// Range of the time-of-hour counter in microseconds
pub const MAX_TIME_BEFORE_ROLLING: u64 = 3_600_000_000;

/// Frame durations kept for RPM estimation
pub const RPM_HISTORY: usize = 10;

/// Rollover-aware timestamp reconstruction.
#[derive(Debug, Default, Clone)]
pub struct TimestampEngine {
    last_raw: Option<u32>,
    rolling_count: u32,
    /// External offset in microseconds (GPS synchronised source)
    time_adjust: f64,
}

impl TimestampEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a raw time-of-hour value to absolute microseconds.
    pub fn compute(&mut self, raw: u32) -> f64 {
        const HALF_RANGE: u64 = MAX_TIME_BEFORE_ROLLING / 2;

        let mut rolling_count = self.rolling_count;
        match self.last_raw {
            Some(last) if raw < last && (last - raw) as u64 > HALF_RANGE => {
                self.rolling_count += 1;
                rolling_count = self.rolling_count;
                self.last_raw = Some(raw);
            }
            Some(last) if raw > last && (raw - last) as u64 > HALF_RANGE && rolling_count > 0 => {
                // Late packet from before the last rollover
                rolling_count -= 1;
            }
            _ => self.last_raw = Some(raw),
        }

        raw as f64 + rolling_count as f64 * MAX_TIME_BEFORE_ROLLING as f64 + self.time_adjust
    }

    /// Rollovers seen since the start of the session.
    pub fn rolling_count(&self) -> u32 {
        self.rolling_count
    }

    pub fn last_raw(&self) -> Option<u32> {
        self.last_raw
    }

    pub fn time_adjust(&self) -> f64 {
        self.time_adjust
    }

    /// Set the external offset, in microseconds, added to every timestamp.
    pub fn set_time_adjust(&mut self, time_adjust: f64) {
        self.time_adjust = time_adjust;
    }

    /// Resume from a known raw time and rollover count.
    pub fn seed(&mut self, raw: u32, rolling_count: u32) {
        self.last_raw = Some(raw);
        self.rolling_count = rolling_count;
    }

    /// Forget rollover history. The external offset is kept.
    pub fn reset(&mut self) {
        self.last_raw = None;
        self.rolling_count = 0;
    }
}

/// Rotation speed estimate from the time between frame boundaries.
///
/// Diagnostic only, never fed back into timestamps.
#[derive(Debug, Default, Clone)]
pub struct RpmEstimator {
    last_boundary: Option<f64>,
    history: VecDeque<f64>,
}

impl RpmEstimator {
    pub fn new() -> Self {
        Self {
            last_boundary: None,
            history: VecDeque::with_capacity(RPM_HISTORY),
        }
    }

    /// Record a frame boundary at `timestamp` (µs). Returns the RPM of the
    /// rotation that just ended, when a previous boundary is known.
    pub fn on_boundary(&mut self, timestamp: f64) -> Option<f64> {
        let rpm = self
            .last_boundary
            .map(|previous| timestamp - previous)
            .filter(|duration| *duration > 0.0)
            .map(|duration| 60.0e6 / duration);

        if let Some(rpm) = rpm {
            if self.history.len() == RPM_HISTORY {
                self.history.pop_front();
            }
            self.history.push_back(rpm);
        }
        self.last_boundary = Some(timestamp);
        rpm
    }

    /// Mean of the recent history, 0 when no rotation completed yet.
    pub fn rpm(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn reset(&mut self) {
        self.last_boundary = None;
        self.history.clear();
    }
}

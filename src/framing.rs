// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame boundary detection from successive firing azimuths.
//!
//! A frame ends when the azimuth wraps from near 36000 back to near 0.
//! Azimuth decreases smaller than the rollover margin are ignored so that
//! repeated dual-return azimuths and small reorderings do not split.

/// Default wrap margin, hundredths of a degree
pub const DEFAULT_ROLLOVER_MARGIN: u16 = 18_000;

/// Framing phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramingPhase {
    #[default]
    Accumulating,
    /// A boundary was reported by the last observation
    JustSplit,
}

/// Azimuth wrap state machine.
#[derive(Clone, Debug)]
pub struct FramingState {
    last_azimuth: Option<u16>,
    margin: u16,
    phase: FramingPhase,
}

impl FramingState {
    pub fn new(margin: u16) -> Self {
        Self {
            last_azimuth: None,
            margin,
            phase: FramingPhase::Accumulating,
        }
    }

    /// Feed the azimuth of the next firing. Returns `true` when it starts a
    /// new rotation.
    pub fn observe(&mut self, azimuth: u16) -> bool {
        let split = match self.last_azimuth {
            Some(last) => last > azimuth && last - azimuth > self.margin,
            None => false,
        };
        self.last_azimuth = Some(azimuth);
        self.phase = if split {
            FramingPhase::JustSplit
        } else {
            FramingPhase::Accumulating
        };
        split
    }

    pub fn phase(&self) -> FramingPhase {
        self.phase
    }

    pub fn last_azimuth(&self) -> Option<u16> {
        self.last_azimuth
    }

    pub fn margin(&self) -> u16 {
        self.margin
    }

    pub fn reset(&mut self) {
        self.last_azimuth = None;
        self.phase = FramingPhase::Accumulating;
    }
}

impl Default for FramingState {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLOVER_MARGIN)
    }
}

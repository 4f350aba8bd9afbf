// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor identity inference from rolling packet data.
//!
//! When no calibration is supplied the interpreter cannot trust a single
//! packet: HDL-64 factory fields carry rolling status bytes and live
//! streams occasionally deliver noise. The accumulator keeps a window of
//! recent factory bytes and structural flags and converges once enough
//! packets agree on a majority value.

use crate::{
    lidar::{PowerMode, ReturnMode, SensorModel, SensorState},
    packet::PacketSlice,
};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Minimum packets observed before a guess is exposed
pub const CONVERGENCE_PACKETS: usize = 8;

/// Number of recent packets kept in the window
const WINDOW_SIZE: usize = 64;

#[derive(Clone, Copy, Debug)]
struct Observation {
    field1: u8,
    field2: u8,
    hdl64: bool,
    vls128: bool,
    /// Dual-return block layout, HDL-64 only
    hdl64_dual: bool,
}

/// Rolling histogram of factory bytes across recent packets.
#[derive(Debug, Default)]
pub struct RollingCalibrationAccumulator {
    window: VecDeque<Observation>,
    converged: Option<SensorState>,
}

impl RollingCalibrationAccumulator {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_SIZE),
            converged: None,
        }
    }

    /// Record one packet. Returns the inferred state on the packet that
    /// made the accumulator converge, `None` otherwise.
    pub fn observe(&mut self, packet: &PacketSlice<'_>) -> Option<SensorState> {
        if self.converged.is_some() {
            return None;
        }

        if self.window.len() == WINDOW_SIZE {
            self.window.pop_front();
        }
        let hdl64 = packet.is_hdl64();
        self.window.push_back(Observation {
            field1: packet.factory_field1(),
            field2: packet.factory_field2(),
            hdl64,
            vls128: packet.is_vls128(),
            hdl64_dual: hdl64 && packet.hdl64_return_mode().is_dual(),
        });

        self.converged = self.infer();
        self.converged
    }

    fn infer(&self) -> Option<SensorState> {
        if self.window.len() < CONVERGENCE_PACKETS {
            return None;
        }

        let hdl64 = majority(self.window.iter().map(|o| o.hdl64))?;
        let field1 = majority(self.window.iter().map(|o| o.field1));

        let (model, field2) = if hdl64 {
            // Factory field 2 carries rolling status values on HDL-64
            let last = self.window.back().map(|o| o.field2).unwrap_or_default();
            (SensorModel::Hdl64, last)
        } else {
            let field2 = majority(self.window.iter().map(|o| o.field2))?;
            // Non-HDL-64 sensors report a stable return mode byte
            if field1.is_none() {
                return None;
            }
            (SensorModel::from_factory_byte(field2), field2)
        };

        let field1 = field1
            .or_else(|| self.window.back().map(|o| o.field1))
            .unwrap_or_default();
        let vls128 = majority(self.window.iter().map(|o| o.vls128)).unwrap_or(false);
        let return_mode = if !hdl64 {
            ReturnMode::from_factory_byte(field1).unwrap_or_default()
        } else if majority(self.window.iter().map(|o| o.hdl64_dual)) == Some(true) {
            ReturnMode::Dual
        } else {
            ReturnMode::Strongest
        };

        Some(SensorState {
            model,
            return_mode,
            power_mode: PowerMode::Unknown,
            is_hdl64: hdl64,
            is_vls128: vls128,
            factory_field1: field1,
            factory_field2: field2,
        })
    }

    /// Converged inference, if any.
    pub fn best_guess(&self) -> Option<SensorState> {
        self.converged
    }

    pub fn is_converged(&self) -> bool {
        self.converged.is_some()
    }

    /// Packets currently held in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.converged = None;
    }
}

/// Value held by strictly more than half of the items.
fn majority<T: Copy + Eq + Hash>(items: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut total = 0;
    for item in items {
        *counts.entry(item).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .find(|&(_, count)| count * 2 > total)
        .map(|(value, _)| value)
}

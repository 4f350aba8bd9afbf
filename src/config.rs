// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Interpreter configuration.
//!
//! Every field has a default so a JSON document only needs to name the
//! options it changes:
//!
//! ```
//! use edgefirst_velodyne::config::InterpreterConfig;
//!
//! let config = InterpreterConfig::from_json_str(r#"{ "firing_skip": 1 }"#).unwrap();
//! assert_eq!(config.firing_skip, 1);
//! assert!(config.ignore_zero_distances);
//! ```

use crate::{
    framing::DEFAULT_ROLLOVER_MARGIN,
    lidar::{Error, Result, ReturnMode},
    packet::MAX_LASERS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decode options applied to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpreterConfig {
    /// Azimuth decrease that marks a new rotation, hundredths of a degree
    pub rollover_margin: u16,
    /// Points reserved per frame
    pub points_per_frame: usize,
    /// Drop returns with a raw distance of zero
    pub ignore_zero_distances: bool,
    /// Apply HDL-64 focal intensity correction
    pub intensity_correction: bool,
    /// Interpolate azimuth and time within a firing block
    pub intra_firing_adjustment: bool,
    /// Firing blocks skipped between two decoded blocks
    pub firing_skip: usize,
    /// Laser ids whose returns are dropped
    pub disabled_lasers: Vec<u8>,
    /// Offset added to every timestamp, microseconds
    pub time_adjust: f64,
    /// Return mode forced on every packet. When unset it is read from
    /// factory field 1, or from the block layout on HDL-64.
    pub return_mode: Option<ReturnMode>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            rollover_margin: DEFAULT_ROLLOVER_MARGIN,
            points_per_frame: 60_000,
            ignore_zero_distances: true,
            intensity_correction: false,
            intra_firing_adjustment: true,
            firing_skip: 0,
            disabled_lasers: Vec::new(),
            time_adjust: 0.0,
            return_mode: None,
        }
    }
}

impl InterpreterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rollover_margin == 0 || self.rollover_margin >= 36_000 {
            return Err(Error::Config(format!(
                "rollover_margin {} outside 1..36000",
                self.rollover_margin
            )));
        }
        if !self.time_adjust.is_finite() {
            return Err(Error::Config("time_adjust must be finite".to_string()));
        }
        if let Some(laser) = self
            .disabled_lasers
            .iter()
            .find(|&&laser| laser as usize >= MAX_LASERS)
        {
            return Err(Error::Config(format!(
                "disabled laser {} exceeds {} lasers",
                laser, MAX_LASERS
            )));
        }
        Ok(())
    }

    /// Per-laser enable mask derived from `disabled_lasers`.
    pub fn laser_mask(&self) -> [bool; MAX_LASERS] {
        let mut mask = [true; MAX_LASERS];
        for &laser in &self.disabled_lasers {
            if let Some(enabled) = mask.get_mut(laser as usize) {
                *enabled = false;
            }
        }
        mask
    }
}

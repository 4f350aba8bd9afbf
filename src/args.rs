// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_velodyne::lidar::SensorModel;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Raw packet dump: back-to-back 1206-byte sensor payloads.
    #[arg(env)]
    pub input: PathBuf,

    /// Interpreter configuration as JSON.  Options not named in the file
    /// keep their defaults.
    #[arg(long, env)]
    pub config: Option<PathBuf>,

    /// Decode with the factory calibration of this sensor instead of
    /// inferring the sensor from the packets.
    #[arg(long, env)]
    pub sensor: Option<SensorModel>,

    /// Print the frame catalog of the dump as JSON and exit
    #[arg(long, env)]
    pub catalog: bool,

    /// Start decoding at this frame of the catalog
    #[arg(long, env)]
    pub start_frame: Option<usize>,

    /// Timestamp offset in microseconds, overrides the configuration
    #[arg(long, env, allow_hyphen_values = true)]
    pub time_adjust: Option<f64>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

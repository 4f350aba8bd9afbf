// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic packet construction for tests and benchmarks.
//!
//! # Example
//!
//! ```
//! use edgefirst_velodyne::{packet::is_lidar_packet, synthetic::PacketBuilder};
//!
//! let packet = PacketBuilder::new()
//!     .sweep(0, 20)
//!     .fill(500, 100)
//!     .raw_time(1_000)
//!     .build();
//! assert!(is_lidar_packet(&packet));
//! ```

use crate::{
    lidar::ReturnMode,
    packet::{
        BlockId, FIRING_BLOCK_SIZE, FIRINGS_PER_PACKET, LASER_RETURN_SIZE, LASERS_PER_FIRING,
        PACKET_SIZE,
    },
};

/// Builder for valid 1206-byte data packets.
#[derive(Clone, Debug)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    /// Upper blocks at azimuth 0, zero returns, strongest return, HDL-32E.
    pub fn new() -> Self {
        let mut builder = Self {
            data: vec![0u8; PACKET_SIZE],
        };
        for block in 0..FIRINGS_PER_PACKET {
            builder = builder.block_id(block, BlockId::Upper);
        }
        builder.return_mode(ReturnMode::Strongest).model_byte(0x21)
    }

    pub fn block_id(mut self, block: usize, id: BlockId) -> Self {
        let start = block * FIRING_BLOCK_SIZE;
        self.data[start..start + 2].copy_from_slice(&(id as u16).to_le_bytes());
        self
    }

    /// Alternate upper and lower half-blocks.
    pub fn hdl64(mut self) -> Self {
        for block in 0..FIRINGS_PER_PACKET {
            let id = if block % 2 == 0 {
                BlockId::Upper
            } else {
                BlockId::Lower
            };
            self = self.block_id(block, id);
        }
        self
    }

    pub fn azimuth(mut self, block: usize, azimuth: u16) -> Self {
        let start = block * FIRING_BLOCK_SIZE + 2;
        self.data[start..start + 2].copy_from_slice(&azimuth.to_le_bytes());
        self
    }

    /// Azimuths `start, start + step, ...` wrapped at 36000.
    pub fn sweep(mut self, start: u16, step: u16) -> Self {
        for block in 0..FIRINGS_PER_PACKET {
            let azimuth = (start as u32 + block as u32 * step as u32) % 36_000;
            self = self.azimuth(block, azimuth as u16);
        }
        self
    }

    pub fn laser(mut self, block: usize, slot: usize, distance: u16, intensity: u8) -> Self {
        let start = block * FIRING_BLOCK_SIZE + 4 + slot * LASER_RETURN_SIZE;
        self.data[start..start + 2].copy_from_slice(&distance.to_le_bytes());
        self.data[start + 2] = intensity;
        self
    }

    /// Same return on every slot of every block.
    pub fn fill(mut self, distance: u16, intensity: u8) -> Self {
        for block in 0..FIRINGS_PER_PACKET {
            for slot in 0..LASERS_PER_FIRING {
                self = self.laser(block, slot, distance, intensity);
            }
        }
        self
    }

    pub fn raw_time(mut self, time: u32) -> Self {
        let start = FIRINGS_PER_PACKET * FIRING_BLOCK_SIZE;
        self.data[start..start + 4].copy_from_slice(&time.to_le_bytes());
        self
    }

    pub fn factory_field1(mut self, value: u8) -> Self {
        self.data[PACKET_SIZE - 2] = value;
        self
    }

    pub fn return_mode(self, mode: ReturnMode) -> Self {
        self.factory_field1(mode as u8)
    }

    pub fn model_byte(mut self, value: u8) -> Self {
        self.data[PACKET_SIZE - 1] = value;
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

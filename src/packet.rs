// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Legacy Velodyne data packet layout.
//!
//! # Packet Structure
//!
//! Data packets are 1206 bytes of UDP payload:
//! - 12 firing blocks × 100 bytes = 1200 bytes
//!   - Block identifier: 2 bytes, little-endian (`0xEEFF`, `0xDDFF`, ...)
//!   - Azimuth: 2 bytes, hundredths of a degree (0-35999)
//!   - 32 laser returns × 3 bytes (distance: u16, intensity: u8)
//! - Time of hour: 4 bytes, microseconds
//! - Factory field 1: return mode
//! - Factory field 2: sensor model
//!
//! The slice types below borrow the caller's buffer; nothing is copied.

use crate::lidar::{Error, ReturnMode, SensorModel};

/// Data packet size in bytes
pub const PACKET_SIZE: usize = 1206;

/// Number of firing blocks per packet
pub const FIRINGS_PER_PACKET: usize = 12;

/// Number of laser slots in a firing block
pub const LASERS_PER_FIRING: usize = 32;

/// Size of one laser return in bytes
pub const LASER_RETURN_SIZE: usize = 3;

/// Size of one firing block in bytes
pub const FIRING_BLOCK_SIZE: usize = 4 + LASERS_PER_FIRING * LASER_RETURN_SIZE;

/// Offset of the time-of-hour counter
const TIMESTAMP_OFFSET: usize = FIRINGS_PER_PACKET * FIRING_BLOCK_SIZE;

/// Offset of factory field 1 (return mode)
const FACTORY_FIELD1_OFFSET: usize = TIMESTAMP_OFFSET + 4;

/// Offset of factory field 2 (sensor model)
const FACTORY_FIELD2_OFFSET: usize = TIMESTAMP_OFFSET + 5;

/// Maximum number of lasers addressable by block identifiers
pub const MAX_LASERS: usize = 128;

/// Raw packet handed to the interpreter by the capture or network layer.
#[derive(Clone, Copy, Debug)]
pub struct RawPacket<'a> {
    pub data: &'a [u8],
    /// Byte offset of the packet in its capture file, if replayed
    pub file_position: Option<u64>,
    /// Packet arrival time in seconds, if known
    pub network_time: Option<f64>,
}

impl<'a> RawPacket<'a> {
    /// Packet without capture metadata.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            file_position: None,
            network_time: None,
        }
    }

    pub fn with_file_position(mut self, position: u64) -> Self {
        self.file_position = Some(position);
        self
    }

    pub fn with_network_time(mut self, time: f64) -> Self {
        self.network_time = Some(time);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Firing block identifiers, one per bank of 32 lasers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockId {
    /// Lasers 0-31
    Upper = 0xeeff,
    /// Lasers 32-63
    Lower = 0xddff,
    /// Lasers 64-95 (VLS-128)
    Bank2 = 0xccff,
    /// Lasers 96-127 (VLS-128)
    Bank3 = 0xbbff,
}

impl BlockId {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0xeeff => Some(BlockId::Upper),
            0xddff => Some(BlockId::Lower),
            0xccff => Some(BlockId::Bank2),
            0xbbff => Some(BlockId::Bank3),
            _ => None,
        }
    }

    /// Laser id of the first slot of the block.
    pub fn laser_offset(&self) -> usize {
        match self {
            BlockId::Upper => 0,
            BlockId::Lower => 32,
            BlockId::Bank2 => 64,
            BlockId::Bank3 => 96,
        }
    }
}

/// Cheap structural test: correct size and every block identifier known.
///
/// Pure and stateless. Buffers longer than [`PACKET_SIZE`] are accepted and
/// only their first [`PACKET_SIZE`] bytes are interpreted.
pub fn is_lidar_packet(data: &[u8]) -> bool {
    PacketSlice::from_slice(data).is_ok()
}

/// One laser return
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaserReturn {
    /// Raw distance in sensor units
    pub distance: u16,
    /// Raw intensity
    pub intensity: u8,
}

/// Borrowed view of one firing block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FiringBlock<'a> {
    slice: &'a [u8],
}

impl<'a> FiringBlock<'a> {
    pub fn block_id(&self) -> BlockId {
        // Validated by PacketSlice::from_slice
        BlockId::from_u16(self.raw_block_id()).unwrap_or(BlockId::Upper)
    }

    pub fn raw_block_id(&self) -> u16 {
        u16::from_le_bytes([self.slice[0], self.slice[1]])
    }

    /// Azimuth in hundredths of a degree.
    pub fn azimuth(&self) -> u16 {
        u16::from_le_bytes([self.slice[2], self.slice[3]])
    }

    pub fn laser_return(&self, slot: usize) -> LaserReturn {
        let start = 4 + slot * LASER_RETURN_SIZE;
        LaserReturn {
            distance: u16::from_le_bytes([self.slice[start], self.slice[start + 1]]),
            intensity: self.slice[start + 2],
        }
    }

    pub fn laser_returns(&self) -> impl Iterator<Item = LaserReturn> + 'a {
        self.slice[4..FIRING_BLOCK_SIZE]
            .chunks_exact(LASER_RETURN_SIZE)
            .map(|chunk| LaserReturn {
                distance: u16::from_le_bytes([chunk[0], chunk[1]]),
                intensity: chunk[2],
            })
    }
}

/// Borrowed, validated view of a data packet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketSlice<'a> {
    slice: &'a [u8],
}

impl<'a> PacketSlice<'a> {
    pub fn from_slice(slice: &'a [u8]) -> Result<PacketSlice<'a>, Error> {
        if slice.len() < PACKET_SIZE {
            return Err(Error::UnexpectedEnd(slice.len()));
        }
        let slice = &slice[..PACKET_SIZE];

        for block in 0..FIRINGS_PER_PACKET {
            let start = block * FIRING_BLOCK_SIZE;
            let id = u16::from_le_bytes([slice[start], slice[start + 1]]);
            if BlockId::from_u16(id).is_none() {
                return Err(Error::UnknownBlockId { block, id });
            }
        }

        Ok(PacketSlice { slice })
    }

    pub fn firing(&self, block: usize) -> FiringBlock<'a> {
        let start = block * FIRING_BLOCK_SIZE;
        FiringBlock {
            slice: &self.slice[start..start + FIRING_BLOCK_SIZE],
        }
    }

    pub fn firings(&self) -> impl Iterator<Item = FiringBlock<'a>> + 'a {
        self.slice[..TIMESTAMP_OFFSET]
            .chunks_exact(FIRING_BLOCK_SIZE)
            .map(|slice| FiringBlock { slice })
    }

    /// Time-of-hour counter in microseconds.
    pub fn raw_time(&self) -> u32 {
        u32::from_le_bytes([
            self.slice[TIMESTAMP_OFFSET],
            self.slice[TIMESTAMP_OFFSET + 1],
            self.slice[TIMESTAMP_OFFSET + 2],
            self.slice[TIMESTAMP_OFFSET + 3],
        ])
    }

    pub fn factory_field1(&self) -> u8 {
        self.slice[FACTORY_FIELD1_OFFSET]
    }

    pub fn factory_field2(&self) -> u8 {
        self.slice[FACTORY_FIELD2_OFFSET]
    }

    pub fn is_vls128(&self) -> bool {
        SensorModel::from_factory_byte(self.factory_field2()) == SensorModel::Vls128
    }

    /// HDL-64 packets alternate upper and lower half-blocks.
    pub fn is_hdl64(&self) -> bool {
        !self.is_vls128() && self.firing(1).block_id() == BlockId::Lower
    }

    /// Model reported by the packet. HDL-64 is recognised by structure
    /// since its factory fields carry status bytes.
    pub fn reported_model(&self) -> SensorModel {
        if self.is_hdl64() {
            SensorModel::Hdl64
        } else {
            SensorModel::from_factory_byte(self.factory_field2())
        }
    }

    /// Return mode from factory field 1. Meaningless on HDL-64.
    pub fn return_mode(&self) -> Option<ReturnMode> {
        ReturnMode::from_factory_byte(self.factory_field1())
    }

    pub fn is_dual_return(&self) -> bool {
        self.factory_field1() == ReturnMode::Dual as u8
    }

    /// HDL-64 return mode, read from structure since its factory fields
    /// rotate status bytes. In dual mode one azimuth spans four blocks
    /// (upper and lower for each return) instead of two.
    pub fn hdl64_return_mode(&self) -> ReturnMode {
        let azimuth = |block: usize| self.firing(block).azimuth();
        if azimuth(0) == azimuth(2) && azimuth(2) != azimuth(4) {
            ReturnMode::Dual
        } else {
            ReturnMode::Strongest
        }
    }

    /// Consecutive blocks forming one dual-return group: the first return
    /// of every bank, then the second return of every bank.
    pub fn dual_group_size(hdl64: bool, vls128: bool) -> usize {
        if vls128 {
            8
        } else if hdl64 {
            4
        } else {
            2
        }
    }

    /// Whether firing `block` carries the second return of a dual pair.
    ///
    /// 32-lane sensors pair blocks (last, strongest); HDL-64 groups four
    /// (upper last, lower last, upper strongest, lower strongest); VLS-128
    /// groups eight, one block per bank and return.
    pub fn is_dual_return_firing(block: usize, dual: bool, group: usize) -> bool {
        dual && block % group >= group / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::PacketBuilder;

    #[test]
    fn test_layout_constants() {
        assert_eq!(FIRING_BLOCK_SIZE, 100);
        assert_eq!(TIMESTAMP_OFFSET, 1200);
        assert_eq!(FACTORY_FIELD2_OFFSET, PACKET_SIZE - 1);
    }

    #[test]
    fn test_classify_size() {
        let packet = PacketBuilder::new().build();
        assert!(is_lidar_packet(&packet));
        assert!(!is_lidar_packet(&packet[..PACKET_SIZE - 1]));
        assert!(!is_lidar_packet(&[]));
    }

    #[test]
    fn test_classify_trailing_bytes() {
        let mut packet = PacketBuilder::new().build();
        packet.extend_from_slice(&[0u8; 8]);
        assert!(is_lidar_packet(&packet));
    }

    #[test]
    fn test_classify_bad_signature() {
        let mut packet = PacketBuilder::new().build();
        packet[5 * FIRING_BLOCK_SIZE] = 0x00;
        assert!(!is_lidar_packet(&packet));
        match PacketSlice::from_slice(&packet) {
            Err(Error::UnknownBlockId { block, .. }) => assert_eq!(block, 5),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_field_access() {
        let packet = PacketBuilder::new()
            .model_byte(0x22)
            .return_mode(ReturnMode::Dual)
            .raw_time(123_456_789)
            .azimuth(3, 12_345)
            .laser(3, 7, 1000, 42)
            .build();
        let slice = PacketSlice::from_slice(&packet).unwrap();

        assert_eq!(slice.raw_time(), 123_456_789);
        assert_eq!(slice.factory_field1(), 0x39);
        assert_eq!(slice.factory_field2(), 0x22);
        assert_eq!(slice.reported_model(), SensorModel::Vlp16);
        assert!(slice.is_dual_return());
        assert_eq!(slice.firing(3).azimuth(), 12_345);
        assert_eq!(
            slice.firing(3).laser_return(7),
            LaserReturn {
                distance: 1000,
                intensity: 42
            }
        );
        assert_eq!(slice.firings().count(), FIRINGS_PER_PACKET);
        assert_eq!(slice.firing(3).laser_returns().nth(7).unwrap().distance, 1000);
    }

    #[test]
    fn test_hdl64_detection() {
        let packet = PacketBuilder::new().hdl64().build();
        let slice = PacketSlice::from_slice(&packet).unwrap();
        assert!(slice.is_hdl64());
        assert_eq!(slice.reported_model(), SensorModel::Hdl64);
        assert_eq!(slice.firing(0).block_id(), BlockId::Upper);
        assert_eq!(slice.firing(1).block_id().laser_offset(), 32);

        let packet = PacketBuilder::new().model_byte(0xa1).hdl64().build();
        let slice = PacketSlice::from_slice(&packet).unwrap();
        assert!(!slice.is_hdl64());
        assert!(slice.is_vls128());
    }

    #[test]
    fn test_dual_return_firing_blocks() {
        let second_returns = |group: usize| -> Vec<usize> {
            (0..FIRINGS_PER_PACKET)
                .filter(|&b| PacketSlice::is_dual_return_firing(b, true, group))
                .collect()
        };

        assert_eq!(PacketSlice::dual_group_size(false, false), 2);
        assert_eq!(second_returns(2), vec![1, 3, 5, 7, 9, 11]);
        assert_eq!(PacketSlice::dual_group_size(true, false), 4);
        assert_eq!(second_returns(4), vec![2, 3, 6, 7, 10, 11]);
        assert_eq!(PacketSlice::dual_group_size(false, true), 8);
        assert_eq!(second_returns(8), vec![4, 5, 6, 7]);

        assert!(!PacketSlice::is_dual_return_firing(1, false, 2));
    }

    #[test]
    fn test_hdl64_return_mode_from_structure() {
        let mut dual = PacketBuilder::new().hdl64();
        let mut single = PacketBuilder::new().hdl64();
        for block in 0..FIRINGS_PER_PACKET {
            dual = dual.azimuth(block, (block / 4) as u16 * 18);
            single = single.azimuth(block, (block / 2) as u16 * 18);
        }

        let packet = dual.build();
        let slice = PacketSlice::from_slice(&packet).unwrap();
        assert_eq!(slice.hdl64_return_mode(), ReturnMode::Dual);

        let packet = single.build();
        let slice = PacketSlice::from_slice(&packet).unwrap();
        assert_eq!(slice.hdl64_return_mode(), ReturnMode::Strongest);

        // A stationary head repeats every azimuth
        let packet = PacketBuilder::new().hdl64().build();
        let slice = PacketSlice::from_slice(&packet).unwrap();
        assert_eq!(slice.hdl64_return_mode(), ReturnMode::Strongest);
    }

    #[test]
    fn test_raw_packet_metadata() {
        let data = [0u8; 4];
        let packet = RawPacket::new(&data)
            .with_file_position(4096)
            .with_network_time(12.5);
        assert_eq!(packet.file_position, Some(4096));
        assert_eq!(packet.network_time, Some(12.5));
        assert_eq!(packet.len(), 4);
    }
}

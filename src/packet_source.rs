// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet sources feeding the interpreter.
//!
//! The interpreter never performs I/O. A [`PacketSource`] hands it raw
//! payloads together with their capture metadata:
//!
//! - [`RecordSource`]: fixed-length records from a raw dump, each tagged
//!   with its byte offset in the dump
//! - [`TestSource`]: pre-built packets with synthetic arrival times
//!
//! [`replay`] drives any source through a [`PacketInterpreter`] until the
//! source is exhausted and force-flushes the last partial frame.
//!
//! # Example
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! use edgefirst_velodyne::{
//!     config::InterpreterConfig,
//!     interpreter::LegacyInterpreter,
//!     packet_source::{TestSource, replay},
//!     synthetic::PacketBuilder,
//! };
//!
//! let packets = vec![PacketBuilder::new().sweep(0, 20).fill(500, 10).build()];
//! let mut source = TestSource::new(packets);
//! let mut interpreter = LegacyInterpreter::new(InterpreterConfig::default()).unwrap();
//!
//! let mut frames = Vec::new();
//! let stats = replay(&mut source, &mut interpreter, |frame| frames.push(frame))
//!     .await
//!     .unwrap();
//! assert_eq!(stats.packets, 1);
//! assert_eq!(frames.len(), 1);
//! # });
//! ```

use crate::{
    frame::Frame,
    lidar::{Error, PacketInterpreter, Warning},
    packet::{PACKET_SIZE, RawPacket},
};
use std::{future::Future, path::Path, pin::Pin};
use tracing::{debug, trace};

/// Capture metadata of a received packet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PacketMeta {
    /// Bytes written to the receive buffer
    pub len: usize,
    /// Byte offset of the packet in its capture
    pub file_position: Option<u64>,
    /// Arrival time, seconds
    pub network_time: Option<f64>,
}

/// Trait for packet sources.
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(meta)` - Received length and capture metadata
    /// - `Err(Error::Exhausted)` - No packet left
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<PacketMeta, Error>> + Send + 'a>>;

    /// Check if more packets are available.
    fn has_more(&self) -> bool;
}

/// Fixed-length records read back from a raw packet dump.
///
/// A trailing partial record is delivered as a short packet, which the
/// interpreter rejects.
pub struct RecordSource {
    data: Vec<u8>,
    record_size: usize,
    offset: usize,
}

impl RecordSource {
    /// Read a dump of back-to-back [`PACKET_SIZE`] records.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = tokio::fs::read(path.as_ref()).await?;
        debug!(
            "loaded {} bytes from {}",
            data.len(),
            path.as_ref().display()
        );
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::with_record_size(data, PACKET_SIZE)
    }

    pub fn with_record_size(data: Vec<u8>, record_size: usize) -> Self {
        Self {
            data,
            record_size: record_size.max(1),
            offset: 0,
        }
    }

    /// Number of records, counting a trailing partial record.
    pub fn len(&self) -> usize {
        self.data.len().div_ceil(self.record_size)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Continue from the record at byte `position`.
    pub fn seek(&mut self, position: u64) {
        self.offset = (position as usize).min(self.data.len());
    }

    pub fn position(&self) -> u64 {
        self.offset as u64
    }
}

impl PacketSource for RecordSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<PacketMeta, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.offset >= self.data.len() {
                return Err(Error::Exhausted);
            }

            let end = (self.offset + self.record_size).min(self.data.len());
            let record = &self.data[self.offset..end];
            let len = record.len().min(buf.len());
            buf[..len].copy_from_slice(&record[..len]);

            let meta = PacketMeta {
                len,
                file_position: Some(self.offset as u64),
                network_time: None,
            };
            self.offset = end;
            Ok(meta)
        })
    }

    fn has_more(&self) -> bool {
        self.offset < self.data.len()
    }
}

/// Test packet source.
///
/// Provides a sequence of pre-defined packets with arrival times spaced
/// by a fixed interval, for testing without hardware or captures.
pub struct TestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
    start_time: f64,
    interval: f64,
}

impl TestSource {
    /// Packets arriving every 1.33 ms from time zero.
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self {
            packets,
            index: 0,
            start_time: 0.0,
            interval: 0.00133,
        }
    }

    /// Create an empty test source.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Arrival times `start, start + interval, ...` in seconds.
    pub fn with_timing(mut self, start_time: f64, interval: f64) -> Self {
        self.start_time = start_time;
        self.interval = interval;
        self
    }

    /// Reset the source to the beginning.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<PacketMeta, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Exhausted);
            }

            let position: usize = self.packets[..self.index].iter().map(Vec::len).sum();
            let packet = &self.packets[self.index];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);

            let meta = PacketMeta {
                len,
                file_position: Some(position as u64),
                network_time: Some(self.start_time + self.index as f64 * self.interval),
            };
            self.index += 1;
            Ok(meta)
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}

/// Counters collected by [`replay`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayStats {
    /// Packets received from the source
    pub packets: usize,
    /// Packets rejected by the classifier
    pub rejected: usize,
    /// Frames handed to the callback
    pub frames: usize,
    /// Warnings raised while decoding
    pub warnings: Vec<Warning>,
}

/// Feed every packet of `source` to `interpreter`.
///
/// Completed frames are passed to `on_frame` in order. When the source is
/// exhausted the frame in progress is flushed; an empty trailing frame is
/// not emitted.
pub async fn replay<S, I, F>(
    source: &mut S,
    interpreter: &mut I,
    mut on_frame: F,
) -> Result<ReplayStats, Error>
where
    S: PacketSource + ?Sized,
    I: PacketInterpreter + ?Sized,
    F: FnMut(Frame),
{
    let mut stats = ReplayStats::default();
    let mut buf = vec![0u8; 2048];

    while source.has_more() {
        let meta = match source.recv(&mut buf).await {
            Ok(meta) => meta,
            Err(Error::Exhausted) => break,
            Err(err) => return Err(err),
        };
        stats.packets += 1;

        let data = &buf[..meta.len];
        if !interpreter.is_lidar_packet(data) {
            trace!("rejected {} byte packet", meta.len);
            stats.rejected += 1;
            continue;
        }

        let packet = RawPacket {
            data,
            file_position: meta.file_position,
            network_time: meta.network_time,
        };
        let output = interpreter.process_packet(&packet);
        stats.warnings.extend(output.warnings);
        for frame in output.frames {
            stats.frames += 1;
            on_frame(frame);
        }
    }

    if let Some(frame) = interpreter.split_frame(false) {
        stats.frames += 1;
        on_frame(frame);
    }

    Ok(stats)
}

//! Scripted controller used by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};

use aptstage_core::protocol::{Frame, FrameHeader, MessageId, Transport, HEADER_SIZE};
use aptstage_core::stage::DeviceProfile;

/// Bytes flowing in both directions
#[derive(Default)]
pub struct Wire {
    /// Bytes the controller will send
    pub rx: VecDeque<u8>,
    /// Bytes the host wrote
    pub tx: Vec<u8>,
    /// Report read timeouts instead of end of stream once `rx` runs dry
    pub timeout_when_empty: bool,
    /// Whether the transport was closed
    pub closed: bool,
}

/// Transport replaying canned controller output in small chunks
pub struct MockSerial {
    wire: Arc<Mutex<Wire>>,
    chunk: usize,
}

impl MockSerial {
    pub fn new() -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        (
            Self {
                wire: Arc::clone(&wire),
                chunk: 4,
            },
            wire,
        )
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        if wire.rx.is_empty() {
            if wire.timeout_when_empty {
                return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
            }
            return Ok(0);
        }

        let n = buf.len().min(self.chunk).min(wire.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = wire.rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.wire.lock().unwrap().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockSerial {
    fn close(&mut self) -> io::Result<()> {
        self.wire.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Queue a frame as if sent by the controller
pub fn reply(wire: &Arc<Mutex<Wire>>, frame: Frame) {
    let bytes = frame.addressed(0x01, 0x50).encode().unwrap();
    wire.lock().unwrap().rx.extend(bytes);
}

/// Split everything the host wrote into frames
pub fn sent_frames(wire: &Arc<Mutex<Wire>>) -> Vec<Frame> {
    let tx = wire.lock().unwrap().tx.clone();
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < tx.len() {
        let header = FrameHeader::decode(&tx[offset..]).unwrap();
        let end = offset + HEADER_SIZE + header.data_len();
        frames.push(Frame::decode(&tx[offset..end]).unwrap());
        offset = end;
    }
    frames
}

/// Message IDs of everything the host wrote
pub fn sent_ids(wire: &Arc<Mutex<Wire>>) -> Vec<MessageId> {
    sent_frames(wire)
        .iter()
        .map(|f| MessageId::from_code(f.message_id).unwrap())
        .collect()
}

/// 14-byte status block
pub fn status_block(channel: u16, position: i32, velocity: i16, bits: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(14);
    data.extend_from_slice(&channel.to_le_bytes());
    data.extend_from_slice(&position.to_le_bytes());
    data.extend_from_slice(&velocity.to_le_bytes());
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&bits.to_le_bytes());
    data
}

/// Round-number calibration: 1000 counts/mm, 0..50 mm, 2 mm/s, 3 mm/s²
pub fn test_profile() -> DeviceProfile {
    DeviceProfile::new(1000.0, 100.0, 10.0, (0.0, 50.0), 2.0, 3.0).unwrap()
}

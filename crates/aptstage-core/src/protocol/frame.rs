//! Frame encoding/decoding
//!
//! Implements the APT message format.
//!
//! Frame format (all little-endian):
//! - 2 bytes: Message ID
//! - 1 byte: param1, or low byte of the data length
//! - 1 byte: param2, or high byte of the data length
//! - 1 byte: Destination address, bit 7 set when data follows
//! - 1 byte: Source address
//! - N bytes: Data (only when bit 7 of the destination is set)

use byteorder::{ByteOrder, LittleEndian};

use super::{AptError, DEFAULT_DEST, DEFAULT_SRC, HEADER_SIZE};

/// Destination bit signalling that a data block follows the header
pub const DATA_FLAG: u8 = 0x80;

/// Maximum data block length that fits the 16-bit length field
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

/// What follows the message ID in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Two single-byte parameters, no data block
    Params {
        /// First parameter byte
        param1: u8,
        /// Second parameter byte
        param2: u8,
    },
    /// A data block whose length is carried in the header
    Data(Vec<u8>),
}

/// One APT protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message identifier
    pub message_id: u16,
    /// Logical destination address (never has bit 7 set)
    pub dest: u8,
    /// Source address
    pub src: u8,
    /// Header parameters or data block
    pub payload: Payload,
}

impl Frame {
    /// Create a header-only frame with zero parameters
    pub fn new(message_id: u16) -> Self {
        Self::with_params(message_id, 0, 0)
    }

    /// Create a header-only frame
    pub fn with_params(message_id: u16, param1: u8, param2: u8) -> Self {
        Self {
            message_id,
            dest: DEFAULT_DEST,
            src: DEFAULT_SRC,
            payload: Payload::Params { param1, param2 },
        }
    }

    /// Create a frame carrying a data block
    pub fn with_data(message_id: u16, data: Vec<u8>) -> Self {
        Self {
            message_id,
            dest: DEFAULT_DEST,
            src: DEFAULT_SRC,
            payload: Payload::Data(data),
        }
    }

    /// Override the source and destination addresses
    pub fn addressed(mut self, dest: u8, src: u8) -> Self {
        self.dest = dest;
        self.src = src;
        self
    }

    /// Whether a data block accompanies this frame
    pub fn has_data(&self) -> bool {
        matches!(self.payload, Payload::Data(_))
    }

    /// The data block, if any
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Data(data) => Some(data),
            Payload::Params { .. } => None,
        }
    }

    /// Header parameters, if this is a header-only frame
    pub fn params(&self) -> Option<(u8, u8)> {
        match self.payload {
            Payload::Params { param1, param2 } => Some((param1, param2)),
            Payload::Data(_) => None,
        }
    }

    /// Encode the frame to raw bytes
    pub fn encode(&self) -> Result<Vec<u8>, AptError> {
        if self.dest & DATA_FLAG != 0 {
            return Err(AptError::InvalidPayload(format!(
                "destination {:#04x} collides with the data flag",
                self.dest
            )));
        }

        match &self.payload {
            Payload::Params { param1, param2 } => {
                let mut bytes = vec![0u8; HEADER_SIZE];
                LittleEndian::write_u16(&mut bytes[0..2], self.message_id);
                bytes[2] = *param1;
                bytes[3] = *param2;
                bytes[4] = self.dest;
                bytes[5] = self.src;
                Ok(bytes)
            }
            Payload::Data(data) => {
                if data.len() > MAX_DATA_LEN {
                    return Err(AptError::InvalidPayload(format!(
                        "data block of {} bytes exceeds {} bytes",
                        data.len(),
                        MAX_DATA_LEN
                    )));
                }

                let mut bytes = vec![0u8; HEADER_SIZE];
                LittleEndian::write_u16(&mut bytes[0..2], self.message_id);
                LittleEndian::write_u16(&mut bytes[2..4], data.len() as u16);
                bytes[4] = self.dest | DATA_FLAG;
                bytes[5] = self.src;
                bytes.extend_from_slice(data);
                Ok(bytes)
            }
        }
    }

    /// Decode a complete frame (header plus any data block)
    ///
    /// Bytes beyond the declared data length are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, AptError> {
        let header = FrameHeader::decode(bytes)?;
        let needed = HEADER_SIZE + header.data_len();
        if bytes.len() < needed {
            return Err(AptError::TruncatedFrame {
                expected: needed,
                actual: bytes.len(),
            });
        }

        Ok(header.into_frame(bytes[HEADER_SIZE..needed].to_vec()))
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.data().map_or(0, <[u8]>::len)
    }
}

/// The fixed 6-byte header, decoded without touching any data block
///
/// Used for two-phase reads off a stream: read the header, learn how many data
/// bytes follow, then read exactly that many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message identifier
    pub message_id: u16,
    /// First parameter byte (low byte of the data length when data follows)
    pub param1: u8,
    /// Second parameter byte (high byte of the data length when data follows)
    pub param2: u8,
    /// Destination byte as received, including the data flag
    pub raw_dest: u8,
    /// Source address
    pub src: u8,
}

impl FrameHeader {
    /// Decode the header from the first 6 bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, AptError> {
        if bytes.len() < HEADER_SIZE {
            return Err(AptError::TruncatedFrame {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            message_id: LittleEndian::read_u16(&bytes[0..2]),
            param1: bytes[2],
            param2: bytes[3],
            raw_dest: bytes[4],
            src: bytes[5],
        })
    }

    /// Whether a data block follows the header
    pub fn has_data(&self) -> bool {
        self.raw_dest & DATA_FLAG != 0
    }

    /// Number of data bytes following the header (0 for header-only frames)
    pub fn data_len(&self) -> usize {
        if self.has_data() {
            usize::from(self.param1) | (usize::from(self.param2) << 8)
        } else {
            0
        }
    }

    /// Logical destination with the data flag stripped
    pub fn dest(&self) -> u8 {
        self.raw_dest & !DATA_FLAG
    }

    /// Complete the frame with its data block
    ///
    /// `data` is ignored for header-only frames.
    pub fn into_frame(self, data: Vec<u8>) -> Frame {
        let payload = if self.has_data() {
            Payload::Data(data)
        } else {
            Payload::Params {
                param1: self.param1,
                param2: self.param2,
            }
        };

        Frame {
            message_id: self.message_id,
            dest: self.dest(),
            src: self.src,
            payload,
        }
    }
}

/// Builder for little-endian data blocks
pub struct DataBuilder {
    data: Vec<u8>,
}

impl DataBuilder {
    /// Create a new data builder
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Add a 16-bit unsigned value
    pub fn u16_le(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.data.extend_from_slice(&bytes);
        self
    }

    /// Add a 32-bit signed value
    pub fn i32_le(mut self, value: i32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_i32(&mut bytes, value);
        self.data.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    /// Finish the data block
    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for DataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Frame structure, marshal/unmarshal and validity checks.

use super::codec::{checksum, payload_valid};
use super::consts::{CMD_ACK_OK, START_TAG};
use crate::error::{Error, Result};

/// Fixed frame header length.
pub const HEADER_LEN: usize = 16;

/// One protocol frame exchanged with a terminal.
///
/// `code` carries the command on requests and the acknowledgement on
/// replies; both occupy the same wire bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub code: u16,
    pub session: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl Packet {
    /// Construct a request frame.
    pub fn command(code: u16, data: Vec<u8>, session: u16, sequence: u16) -> Self {
        Self {
            code,
            session,
            sequence,
            data,
        }
    }

    /// Marshal the frame; payload length and checksum are filled last.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![0u8; HEADER_LEN + self.data.len()];

        frame[..4].copy_from_slice(&START_TAG);
        frame[8..10].copy_from_slice(&self.code.to_le_bytes());
        frame[12..14].copy_from_slice(&self.session.to_le_bytes());
        frame[14..16].copy_from_slice(&self.sequence.to_le_bytes());
        frame[16..].copy_from_slice(&self.data);

        let payload_len = (frame.len() - 8) as u16;
        frame[4..6].copy_from_slice(&payload_len.to_le_bytes());

        let sum = checksum(&frame[8..]);
        frame[10..12].copy_from_slice(&sum.to_le_bytes());

        frame
    }

    /// Unmarshal a raw frame.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_LEN {
            return Err(Error::InvalidLength);
        }

        if raw[..4] != START_TAG {
            return Err(Error::BadStartTag);
        }

        if !payload_valid(&raw[8..]) {
            return Err(Error::InvalidChecksum);
        }

        Ok(Self {
            code: u16::from_le_bytes([raw[8], raw[9]]),
            session: u16::from_le_bytes([raw[12], raw[13]]),
            sequence: u16::from_le_bytes([raw[14], raw[15]]),
            data: raw[16..].to_vec(),
        })
    }

    /// True when the frame acknowledges success.
    pub fn is_ok(&self) -> bool {
        self.code == CMD_ACK_OK
    }
}

//! Binary audio datagram
//!
//! ```text
//!  0      2      4           9      10     12
//!  ┌──────┬──────┬───────────┬──────┬──────┬───────────────┐
//!  │AA AA │ seq  │ reserved  │flags │ len  │ PCM16 payload │
//!  └──────┴──────┴───────────┴──────┴──────┴───────────────┘
//! ```
//! Multi-byte header fields are big-endian.

use crate::error::FrameError;

pub const SYNC_WORD: u16 = 0xAAAA;
pub const HEADER_SIZE: usize = 12;

const FLAG_DISTRESS: u8 = 0x01;
const FLAG_BIG_ENDIAN: u8 = 0x02;

/// One parsed audio datagram, borrowing its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame<'a> {
    pub sequence: u16,
    pub distress: bool,
    pub big_endian: bool,
    pub payload: &'a [u8],
}

impl<'a> AudioFrame<'a> {
    /// Validate sync word and payload bounds
    pub fn parse(datagram: &'a [u8]) -> Result<Self, FrameError> {
        if datagram.len() < HEADER_SIZE {
            return Err(FrameError::TooShort(datagram.len()));
        }

        let sync = u16::from_be_bytes([datagram[0], datagram[1]]);
        if sync != SYNC_WORD {
            return Err(FrameError::BadSync(sync));
        }

        let sequence = u16::from_be_bytes([datagram[2], datagram[3]]);
        let flags = datagram[9];
        let declared = u16::from_be_bytes([datagram[10], datagram[11]]) as usize;
        let available = datagram.len() - HEADER_SIZE;
        if declared > available {
            return Err(FrameError::PayloadOverrun { declared, available });
        }

        Ok(Self {
            sequence,
            distress: flags & FLAG_DISTRESS != 0,
            big_endian: flags & FLAG_BIG_ENDIAN != 0,
            payload: &datagram[HEADER_SIZE..HEADER_SIZE + declared],
        })
    }
}

/// Build a datagram; used by tests and device simulators
pub fn encode_frame(sequence: u16, distress: bool, big_endian: bool, payload: &[u8]) -> Vec<u8> {
    let mut flags = 0u8;
    if distress {
        flags |= FLAG_DISTRESS;
    }
    if big_endian {
        flags |= FLAG_BIG_ENDIAN;
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&SYNC_WORD.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&[0u8; 5]);
    out.push(flags);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Swap every adjacent byte pair in place; a trailing odd byte is kept
pub fn swap_byte_pairs(data: &mut [u8]) {
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

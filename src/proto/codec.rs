//! Checksum and device time encoding.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Calculate the 16-bit one's-complement checksum of a payload.
///
/// The payload is consumed as little-endian 16-bit words (zero-padded when
/// the length is odd) with end-around carry applied after every addition.
/// A stored frame verifies when the checksum over bytes 8..end, checksum
/// field included, recomputes to zero.
pub fn checksum(payload: &[u8]) -> u16 {
    if payload.is_empty() {
        return 0;
    }

    let mut acc: i64 = 0;
    let mut chunks = payload.chunks_exact(2);
    for word in &mut chunks {
        acc += i64::from(u16::from_le_bytes([word[0], word[1]]));
        if acc > 0xFFFF {
            acc -= 0xFFFF;
        }
    }
    if let [last] = chunks.remainder() {
        // odd tail acts as a zero-padded word
        acc += i64::from(*last);
        if acc > 0xFFFF {
            acc -= 0xFFFF;
        }
    }

    acc = (acc & 0xFFFF) + ((acc >> 16) & 0xFFFF);
    while acc < 0 {
        acc += 0xFFFF;
    }

    (acc as u16) ^ 0xFFFF
}

/// True when a payload carrying its own checksum field verifies.
pub fn payload_valid(payload: &[u8]) -> bool {
    checksum(payload) == 0
}

/// Encode a wall-clock datetime into the device's 8-byte representation.
///
/// The device packs the date into 31-day months and 372-day years:
/// `(((year % 100) * 12 * 31 + (month - 1) * 31 + day - 1) * 86400
///   + hour * 3600 + minute * 60 + second)`, stored u64 little-endian.
pub fn encode_time(t: NaiveDateTime) -> [u8; 8] {
    let days = u64::from(t.year().rem_euclid(100) as u32) * 12 * 31
        + u64::from(t.month0()) * 31
        + u64::from(t.day0());
    let v = days * 86_400
        + u64::from(t.hour()) * 3_600
        + u64::from(t.minute()) * 60
        + u64::from(t.second());

    v.to_le_bytes()
}

/// Decode the device's 8-byte time representation.
///
/// Exact inverse of [`encode_time`]; the year falls out of the 372-day
/// block the encoder packs it into.
pub fn decode_time(raw: &[u8]) -> Result<NaiveDateTime> {
    if raw.len() < 8 {
        return Err(Error::malformed("time value shorter than 8 bytes"));
    }

    let v = u64::from_le_bytes([
        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
    ]);

    let second = (v % 60) as u32;
    let minute = ((v / 60) % 60) as u32;
    let hour = ((v / 3_600) % 24) as u32;

    let days = v / 86_400;
    let day = (days % 31) as u32 + 1;
    let month = ((days / 31) % 12) as u32 + 1;
    let year = (days / 372) as i32 + 2000;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or(Error::InvalidTime(v))
}

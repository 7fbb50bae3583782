//! Server response to a device's initial exchange.

use super::payload::{write_value, LINE_SEPARATOR};
use crate::error::{Error, Result};

/// Configuration handed to a device after its initial exchange: stream
/// stamps, poll cadence, transmission windows and realtime behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeCommand {
    pub serial: String,

    /// Last known attendance-log stamp; zero means none yet.
    pub att_log_stamp: u64,
    /// Last known operator-log stamp; zero means none yet.
    pub oper_log_stamp: u64,
    /// Last known attendance-photo stamp; zero means none yet.
    pub att_photo_stamp: u64,

    /// Seconds to wait before retrying after an error.
    pub error_delay: u32,
    /// Poll cadence in seconds.
    pub delay: u32,
    /// Transmission window schedule, e.g. `00:00;14:05`.
    pub trans_times: String,
    /// Minutes between scheduled transmissions.
    pub trans_interval: u32,
    /// Which record classes the device may transmit.
    pub trans_flag: String,
    pub time_zone: i32,
    /// Non-zero enables realtime record upload.
    pub realtime: u8,
    /// Non-zero enables payload encryption.
    pub encrypt: u8,
    pub server_version: String,
}

impl ExchangeCommand {
    /// Serialize into the newline-separated response body.
    ///
    /// Stamps and the encrypt flag print the literal `None` when zero;
    /// empty strings are omitted entirely.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"GET OPTION FROM: ");
        buf.extend_from_slice(self.serial.as_bytes());

        write_value(buf, "ATTLOGStamp", LINE_SEPARATOR, stamp(self.att_log_stamp).as_bytes());
        write_value(buf, "OPERLOGStamp", LINE_SEPARATOR, stamp(self.oper_log_stamp).as_bytes());
        write_value(buf, "ATTPHOTOStamp", LINE_SEPARATOR, stamp(self.att_photo_stamp).as_bytes());

        write_value(buf, "ErrorDelay", LINE_SEPARATOR, self.error_delay.to_string().as_bytes());
        write_value(buf, "Delay", LINE_SEPARATOR, self.delay.to_string().as_bytes());
        write_value(buf, "TransTimes", LINE_SEPARATOR, self.trans_times.as_bytes());
        write_value(buf, "TransInterval", LINE_SEPARATOR, self.trans_interval.to_string().as_bytes());
        write_value(buf, "TransFlag", LINE_SEPARATOR, self.trans_flag.as_bytes());
        write_value(buf, "TimeZone", LINE_SEPARATOR, self.time_zone.to_string().as_bytes());
        write_value(buf, "Realtime", LINE_SEPARATOR, self.realtime.to_string().as_bytes());
        write_value(buf, "ServerVer", LINE_SEPARATOR, self.server_version.as_bytes());
        write_value(buf, "Encrypt", LINE_SEPARATOR, stamp(u64::from(self.encrypt)).as_bytes());
    }

    /// Convenience allocation-returning form of [`Self::encode_into`].
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Decode a response body back into an exchange command.
    ///
    /// Keys are matched at line starts; a free scan would find `Delay`
    /// inside `ErrorDelay`.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let line_str = |key: &str| {
            line_value(body, key)
                .map(|v| String::from_utf8_lossy(v).trim().to_string())
                .unwrap_or_default()
        };
        let line_int = |key: &str| {
            line_value(body, key)
                .and_then(|v| std::str::from_utf8(v).ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(0)
        };

        // the serial rides on the "GET OPTION FROM: <SN>" line
        let serial = body
            .split(|&b| b == b'\n')
            .next()
            .and_then(|line| line.splitn(2, |&b| b == b':').nth(1))
            .map(|v| String::from_utf8_lossy(v).trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            serial,
            att_log_stamp: parse_stamp(&line_str("ATTLOGStamp")),
            oper_log_stamp: parse_stamp(&line_str("OPERLOGStamp")),
            att_photo_stamp: parse_stamp(&line_str("ATTPHOTOStamp")),
            error_delay: line_int("ErrorDelay") as u32,
            delay: line_int("Delay") as u32,
            trans_times: line_str("TransTimes"),
            trans_interval: line_int("TransInterval") as u32,
            trans_flag: line_str("TransFlag"),
            time_zone: line_int("TimeZone") as i32,
            realtime: line_int("Realtime") as u8,
            encrypt: parse_stamp(&line_str("Encrypt")) as u8,
            server_version: line_str("ServerVer"),
        })
    }
}

/// Value of the `key=value` line starting with `key`.
fn line_value<'a>(body: &'a [u8], key: &str) -> Option<&'a [u8]> {
    body.split(|&b| b == b'\n').find_map(|line| {
        line.strip_prefix(key.as_bytes())
            .and_then(|rest| rest.strip_prefix(b"="))
    })
}

/// Zero stamps travel as the literal `None`.
fn stamp(value: u64) -> String {
    if value == 0 {
        "None".to_string()
    } else {
        value.to_string()
    }
}

fn parse_stamp(text: &str) -> u64 {
    if text.eq_ignore_ascii_case("none") {
        return 0;
    }

    text.parse().unwrap_or(0)
}

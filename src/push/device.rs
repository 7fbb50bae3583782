//! Device descriptor exchanged on the push protocol's first contact.

use super::payload::{extract_int, extract_str, write_value, PAIR_SEPARATOR};
use crate::error::{Error, Result};

/// A push-enabled biometric peripheral, as described by the query string
/// of its initial exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    /// Device serial number; registry key.
    pub serial: String,
    /// Option report, later overwritten by `INFO` polls.
    pub options: String,
    /// Push service version.
    pub push_version: String,
    /// Language code (see [`super::consts::lang`]).
    pub language: u8,
    /// Push communication key.
    pub push_comm_key: String,
}

impl Device {
    /// Decode a device descriptor from an `&`-separated query string.
    pub fn decode(query: &[u8]) -> Result<Self> {
        if query.is_empty() {
            return Err(Error::EmptyPayload);
        }

        Ok(Self {
            serial: extract_str(query, "SN", ""),
            options: extract_str(query, "options", ""),
            push_version: extract_str(query, "pushver", ""),
            language: extract_int(query, "language", 0) as u8,
            push_comm_key: extract_str(query, "pushcommkey", ""),
        })
    }

    /// Encode the descriptor back into query-string form.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        write_value(buf, "SN", &[], self.serial.as_bytes());
        write_value(buf, "options", PAIR_SEPARATOR, self.options.as_bytes());
        write_value(buf, "pushver", PAIR_SEPARATOR, self.push_version.as_bytes());
        write_value(
            buf,
            "language",
            PAIR_SEPARATOR,
            self.language.to_string().as_bytes(),
        );
        write_value(
            buf,
            "pushcommkey",
            PAIR_SEPARATOR,
            self.push_comm_key.as_bytes(),
        );
    }

    /// Convenience allocation-returning form of [`Self::encode_into`].
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

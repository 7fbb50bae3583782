//! Server-queued commands and their correlated responses.

use std::fmt;

use super::payload::{extract_int, extract_str, extract_value};
use crate::error::{Error, Result};

/// Callback invoked when the correlated response arrives.
pub type CommandCallback = Box<dyn FnOnce(CommandResponse) + Send + 'static>;

/// A boxed `FnOnce` trait object can never be `Sync`, but callbacks are only
/// ever moved out of their container and called by value (never invoked
/// through a shared reference), so sharing this wrapper across threads is
/// sound.
pub(crate) struct CallbackSlot(pub(crate) CommandCallback);
unsafe impl Sync for CallbackSlot {}

/// A directive queued for delivery on the device's next poll.
///
/// The identifier is assigned at enqueue time and correlates the eventual
/// [`CommandResponse`]; wire form is `C:<id>:<verb>` optionally followed
/// by a space and the raw payload.
pub struct Command {
    pub id: String,
    pub verb: String,
    pub payload: Option<Vec<u8>>,

    pub(crate) callback: Option<CallbackSlot>,
}

impl Command {
    /// New command with the given verb, e.g. `DATA`, `CHECK` or `REBOOT`.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            verb: verb.into(),
            payload: None,
            callback: None,
        }
    }

    /// Attach a raw payload delivered after the verb.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attach a response callback.
    pub fn with_callback(mut self, callback: impl FnOnce(CommandResponse) + Send + 'static) -> Self {
        self.callback = Some(CallbackSlot(Box::new(callback)));
        self
    }

    /// Serialize into the poll-response wire form.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"C:");
        buf.extend_from_slice(self.id.as_bytes());
        buf.push(b':');
        buf.extend_from_slice(self.verb.as_bytes());

        if let Some(payload) = &self.payload {
            buf.push(b' ');
            buf.extend_from_slice(payload);
        }
    }

    /// Convenience allocation-returning form of [`Self::encode_into`].
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("verb", &self.verb)
            .field("payload", &self.payload)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Device answer to a previously delivered command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    pub id: String,
    /// Numeric return code; zero is success.
    pub return_code: i64,
    pub verb: String,
    pub payload: Option<Vec<u8>>,
}

impl CommandResponse {
    /// True when the device reported success.
    pub fn is_ok(&self) -> bool {
        self.return_code == 0
    }

    /// Parse a response body of the form `ID=…&Return=…&CMD=…`.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(Error::EmptyPayload);
        }

        Ok(Self {
            id: extract_str(body, "ID", ""),
            return_code: extract_int(body, "Return", 0),
            verb: extract_str(body, "CMD", ""),
            payload: extract_value(body, "Data").map(|v| v.to_vec()),
        })
    }
}

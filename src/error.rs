//! Error types and handling.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame shorter than the 16-byte header.
    #[error("packet length less than 16")]
    InvalidLength,

    /// Frame does not begin with the protocol start tag.
    #[error("bad start tag")]
    BadStartTag,

    /// Checksum over the frame payload did not verify.
    #[error("checksum not valid")]
    InvalidChecksum,

    /// Encoded device time does not map to a calendar date.
    #[error("invalid device time value: {0}")]
    InvalidTime(u64),

    /// Operation attempted without an active connection.
    #[error("terminal not connected, call connect() first")]
    NotConnected,

    /// Failed to establish connection to the remote terminal.
    #[error("failed to connect to remote terminal: {0}")]
    ConnectFailed(String),

    /// Device did not answer within the configured deadline.
    #[error("device timeout: {0}")]
    Timeout(String),

    /// Device answered a mutating command with a non-OK ack.
    #[error("device rejected {op}: ack {ack:#06x}")]
    CommandRejected { op: &'static str, ack: u16 },

    /// Bulk transfer opened with an ack the state machine does not know.
    #[error("unexpected ack {0:#06x} during bulk transfer")]
    UnexpectedAck(u16),

    /// Device response does not have the documented shape.
    #[error("malformed device response: {0}")]
    MalformedResponse(String),

    /// User entry is not exactly 72 bytes.
    #[error("invalid user entry length: {0}")]
    InvalidUserEntry(usize),

    /// User id not present on the device user list.
    #[error("user id {0:?} not found on user list")]
    UnknownUserId(String),

    /// Verification-mode reply too short to carry a mode byte.
    #[error("invalid verification response")]
    InvalidVerifyResponse,

    /// Event listener reader task terminated abnormally.
    #[error("event listener terminated: {0}")]
    Listener(String),

    /// Push payload was empty.
    #[error("payload is empty")]
    EmptyPayload,

    /// Command targeted a device that never completed the initial exchange.
    #[error("device {0} is not registered")]
    DeviceNotRegistered(String),

    /// No callback registered for a correlated command response.
    #[error("no callback registered for command {0}")]
    CallbackNotFound(String),

    /// Push server shut down before the correlated response arrived.
    #[error("push server shut down before the response arrived")]
    ServerClosed,

    /// Pop on a queue with no items.
    #[error("queue is empty")]
    QueueEmpty,

    /// Queue backend failure that is not an emptiness condition.
    #[error("internal queue error: {0}")]
    Queue(String),

    /// Redis backend error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// File or socket I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed-response error with message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// True when the error is a read deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

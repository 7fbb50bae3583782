//! Real-time event listener: registration, demultiplex and ACK.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Terminal;
use crate::error::{Error, Result};
use crate::proto::consts::{CMD_REG_EVENT, EF_ATTLOG};
use crate::proto::VerificationKind;

/// Read deadline while listening; expiries are liveness ticks.
const EVENT_READ_DEADLINE: Duration = Duration::from_secs(1);

/// Subscribe to every real-time flag.
const ALL_EVENTS: [u8; 4] = [0xFF, 0xFF, 0x00, 0x00];

/// One real-time event pushed by the device.
///
/// The type is carried in the frame's session field and is drawn from the
/// real-time flag set (`EF_*` constants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: u16,
    pub data: Vec<u8>,
}

/// Decoded attendance-log event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub user_id: String,
    pub kind: VerificationKind,
    pub timestamp: String,
}

impl AttendanceEvent {
    /// Decode an attendance-log event payload.
    pub fn from_event(event: &Event) -> Result<Self> {
        if event.event_type != EF_ATTLOG || event.data.len() < 32 {
            return Err(Error::malformed("not an attendance log event"));
        }

        let d = &event.data;
        let user_id = String::from_utf8_lossy(&d[0..9])
            .trim_end_matches('\0')
            .to_string();
        let kind = VerificationKind(u16::from_le_bytes([d[24], d[25]]) as u8);
        let timestamp = format!(
            "20{:02}/{}/{} {:02}:{:02}:{:02}",
            d[26], d[27], d[28], d[29], d[30], d[31]
        );

        Ok(Self {
            user_id,
            kind,
            timestamp,
        })
    }
}

/// Stream of real-time events plus the terminal held by the reader task.
pub struct EventStream {
    events: mpsc::Receiver<Event>,
    reader: JoinHandle<Terminal>,
}

impl EventStream {
    /// Wait for the next event; `None` once the listener has stopped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Wait for the reader to stop and reclaim the terminal session.
    pub async fn into_terminal(self) -> Result<Terminal> {
        drop(self.events);
        self.reader
            .await
            .map_err(|e| Error::Listener(e.to_string()))
    }
}

/// Listener that borrows a terminal's read path for real-time delivery.
pub struct EventListener {
    terminal: Terminal,
}

impl EventListener {
    pub fn new(terminal: Terminal) -> Self {
        Self { terminal }
    }

    /// Register for all real-time flags and start the reader.
    ///
    /// The caller must not issue other commands on this session while the
    /// stream is live; every received frame is acknowledged on the same
    /// socket. The reader exits at the next deadline expiry after `cancel`
    /// fires, closing the stream.
    pub async fn listen(mut self, cancel: CancellationToken) -> Result<EventStream> {
        self.terminal.enable().await?;

        let reply = self
            .terminal
            .send_and_receive(CMD_REG_EVENT, &ALL_EVENTS)
            .await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "register event",
                ack: reply.code,
            });
        }

        let (tx, rx) = mpsc::channel(16);
        let mut terminal = self.terminal;

        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("event listener cancelled");
                        break;
                    }
                    received = terminal.receive_event(EVENT_READ_DEADLINE) => match received {
                        Ok(Some(event)) => {
                            if tx.send(event).await.is_err() {
                                debug!("event receiver dropped, stopping listener");
                                break;
                            }
                        }
                        Ok(None) => {} // deadline tick, keep listening
                        Err(e) => {
                            warn!("error while listening for events: {e}");
                            break;
                        }
                    }
                }
            }

            terminal
        });

        Ok(EventStream { events: rx, reader })
    }
}

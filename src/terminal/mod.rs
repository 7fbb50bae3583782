//! Terminal session: TCP transport, sequencing, command/reply and bulk
//! transfers against a device's binary protocol port (4370 by convention).

mod events;
mod users;


use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::proto::consts::*;
use crate::proto::Packet;

pub use events::{AttendanceEvent, Event, EventListener, EventStream};
pub use users::{FpTemplate, User, UserCatalog, MAX_USER_SN};

/// Conventional binary protocol port.
pub const DEFAULT_PORT: u16 = 4370;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BUF_SIZE: usize = 1024;

/// Counters reported by the device's free-sizes status block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub users: u32,
    pub fingerprints: u32,
    pub attendance_records: u32,
    pub operation_records: u32,
    pub admins: u32,
    pub passwords: u32,
    pub fingerprint_capacity: u32,
    pub user_capacity: u32,
    pub attendance_capacity: u32,
}

/// Client session against one remote terminal.
///
/// The session owns its TCP connection exclusively; callers must serialize
/// commands, no two may be in flight at once. The last received packet is
/// cached so the next outbound frame can echo the device-assigned session
/// identifier and the running reply counter.
pub struct Terminal {
    address: String,
    timeout: Duration,

    stream: Option<TcpStream>,
    last: Option<Packet>,
}

impl Terminal {
    /// Create a session for `address` with the default 5 s timeout.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_timeout(address, DEFAULT_TIMEOUT)
    }

    /// Create a session with an explicit connect/read timeout.
    pub fn with_timeout(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            stream: None,
            last: None,
        }
    }

    /// True while a TCP connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Session identifier assigned by the device, zero before connect.
    pub fn session_id(&self) -> u16 {
        self.last.as_ref().map(|p| p.session).unwrap_or(0)
    }

    /// Session and sequence fields for the next outbound frame.
    ///
    /// The counter increments by one per send and wraps by subtracting
    /// 0xFFFF at the u16 ceiling.
    fn next_header(&self) -> (u16, u16) {
        let (session, counter) = self
            .last
            .as_ref()
            .map(|p| (p.session, p.sequence))
            .unwrap_or((0, 0));

        let mut next = u32::from(counter) + 1;
        if next >= 0xFFFF {
            next -= 0xFFFF;
        }

        (session, next as u16)
    }

    /// Send a command frame on the underlying connection.
    pub async fn send_command(&mut self, cmd: u16, data: &[u8]) -> Result<()> {
        let (session, sequence) = self.next_header();
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let frame = Packet::command(cmd, data.to_vec(), session, sequence).encode();
        trace!("send {cmd:#06x}: {}", hex::encode(&frame));

        stream.write_all(&frame).await?;

        // remember the sequence we consumed so retries keep advancing
        match self.last.as_mut() {
            Some(p) => p.sequence = sequence,
            None => {
                self.last = Some(Packet {
                    sequence,
                    ..Packet::default()
                })
            }
        }

        Ok(())
    }

    /// Read at most `buf_size` raw bytes from the socket.
    async fn receive_raw(&mut self, buf_size: usize, deadline: Option<Duration>) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let buf_size = if buf_size == 0 { DEFAULT_BUF_SIZE } else { buf_size };
        let mut buf = vec![0u8; buf_size];

        let n = match deadline {
            Some(d) => timeout(d, stream.read(&mut buf))
                .await
                .map_err(|_| Error::Timeout(format!("read timed out after {d:?}")))??,
            None => stream.read(&mut buf).await?,
        };

        if n == 0 {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        buf.truncate(n);
        trace!("recv: {}", hex::encode(&buf));

        Ok(buf)
    }

    /// Wait for a reply frame and decode it.
    ///
    /// `buf_size` of zero selects the 1024-byte default. The decoded packet
    /// is cached to seed the next outbound frame's session and counter.
    pub async fn receive_reply(&mut self, buf_size: usize) -> Result<Packet> {
        let raw = self.receive_raw(buf_size, Some(self.timeout)).await?;
        let reply = Packet::decode(&raw)?;
        self.last = Some(reply.clone());

        Ok(reply)
    }

    /// Send a command and wait for its reply; the common path.
    pub async fn send_and_receive(&mut self, cmd: u16, data: &[u8]) -> Result<Packet> {
        self.send_command(cmd, data).await?;
        self.receive_reply(0).await
    }

    /// Wait for a bulk dataset reply.
    ///
    /// Drives the three-phase transfer: a `Data` ack carries the whole
    /// dataset in one frame; a `PrepareData` ack is followed by the framed
    /// dataset; an `OK` ack announces a prefixed transfer that must be
    /// acknowledged with `DataRdy` and released with `FreeData`.
    pub async fn receive_long_reply(&mut self, buf_size: usize) -> Result<Packet> {
        let buf_size = if buf_size == 0 { DEFAULT_BUF_SIZE } else { buf_size };

        let raw = self.receive_raw(buf_size, Some(self.timeout)).await?;
        let reply = Packet::decode(&raw)?;
        self.last = Some(reply.clone());

        match reply.code {
            // short dataset, delivered in the initial frame
            CMD_DATA => Ok(reply),

            CMD_PREPARE_DATA => {
                let frame = self.read_framed_dataset(buf_size).await?;
                let reply = Packet::decode(&frame)?;
                self.last = Some(reply.clone());
                Ok(reply)
            }

            CMD_ACK_OK => {
                if raw.len() < 9 {
                    return Err(Error::malformed("bulk transfer announce shorter than 9 bytes"));
                }

                // dataset length prefix at bytes 1..9 of the announce frame
                let size = u64::from_le_bytes([
                    raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7], raw[8],
                ]);
                self.send_command(CMD_DATA_RDY, &size.to_le_bytes()).await?;

                // prepare-data frame precedes the dataset
                let _ = self.receive_raw(24, Some(self.timeout)).await?;

                let frame = self.read_framed_dataset(buf_size).await?;
                let mut reply = Packet::decode(&frame)?;

                // ack trails the dataset, then the device buffer is released
                let _ = self.receive_raw(buf_size, Some(self.timeout)).await?;
                self.last = Some(reply.clone());
                self.send_command(CMD_FREE_DATA, &[]).await?;
                let _ = self.receive_raw(buf_size, Some(self.timeout)).await?;

                reply.code += 1;
                Ok(reply)
            }

            other => {
                debug!("unexpected bulk transfer ack {other:#06x}");
                Err(Error::UnexpectedAck(other))
            }
        }
    }

    /// Read one complete dataset frame: a 16-byte head announcing the total
    /// length, then the remainder accumulated in bounded reads.
    async fn read_framed_dataset(&mut self, buf_size: usize) -> Result<Vec<u8>> {
        let mut frame = self.receive_raw(16, Some(self.timeout)).await?;
        if frame.len() < 6 {
            return Err(Error::malformed("dataset head shorter than 6 bytes"));
        }

        let total = 8 + u16::from_le_bytes([frame[4], frame[5]]) as usize;
        while frame.len() < total {
            let want = (total - frame.len()).min(buf_size);
            let chunk = self.receive_raw(want, Some(self.timeout)).await?;
            frame.extend_from_slice(&chunk);
        }

        Ok(frame)
    }

    /// Establish the session: TCP connect, `Connect` handshake, then mark
    /// the SDK build option. Idempotent when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        debug!(address = %self.address, "connecting");
        let stream = timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| Error::ConnectFailed(format!("{}: connection timed out", self.address)))?
            .map_err(|e| Error::ConnectFailed(format!("{}: {e}", self.address)))?;
        self.stream = Some(stream);

        self.send_and_receive(CMD_CONNECT, &[]).await?;
        debug!(session = self.session_id(), "session established");

        self.set_info("SDKBuild", "1").await?;

        Ok(())
    }

    /// Close the session; the socket is released even when the device
    /// rejects the exit command.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }

        let result = self.send_and_receive(CMD_EXIT, &[]).await;
        self.stream = None;
        self.last = None;

        let reply = result?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "exit",
                ack: reply.code,
            });
        }

        Ok(())
    }

    /// Re-enable the device for user interaction.
    pub async fn enable(&mut self) -> Result<()> {
        let reply = self.send_and_receive(CMD_ENABLE_DEVICE, &[]).await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "enable device",
                ack: reply.code,
            });
        }

        Ok(())
    }

    /// Disable the device, optionally for a bounded number of seconds.
    pub async fn disable(&mut self, duration: Option<Duration>) -> Result<()> {
        let data = duration
            .filter(|d| !d.is_zero())
            .map(|d| (d.as_secs() as u16).to_le_bytes().to_vec())
            .unwrap_or_default();

        let reply = self.send_and_receive(CMD_DISABLE_DEVICE, &data).await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "disable device",
                ack: reply.code,
            });
        }

        Ok(())
    }

    /// Reboot the device; the session is dropped since the device goes away.
    pub async fn restart(&mut self) -> Result<()> {
        self.send_command(CMD_RESTART, &[]).await?;
        self.stream = None;
        self.last = None;

        Ok(())
    }

    /// Read the device wall-clock.
    pub async fn get_time(&mut self) -> Result<NaiveDateTime> {
        let reply = self.send_and_receive(CMD_GET_TIME, &[]).await?;
        crate::proto::codec::decode_time(&reply.data)
    }

    /// Set the device wall-clock.
    pub async fn set_time(&mut self, t: NaiveDateTime) -> Result<()> {
        let reply = self
            .send_and_receive(CMD_SET_TIME, &crate::proto::codec::encode_time(t))
            .await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "set time",
                ack: reply.code,
            });
        }

        Ok(())
    }

    /// Read the firmware version string.
    pub async fn get_version(&mut self) -> Result<String> {
        let reply = self.send_and_receive(CMD_GET_VERSION, &[]).await?;
        Ok(trim_nul(&reply.data))
    }

    /// Read one device option; empty string when the key is unknown.
    pub async fn get_info(&mut self, key: &str) -> Result<String> {
        let reply = self.send_and_receive(CMD_OPTIONS_RRQ, key.as_bytes()).await?;

        let text = trim_nul(&reply.data);
        Ok(text
            .split_once('=')
            .map(|(_, value)| value.to_string())
            .unwrap_or_default())
    }

    /// Write one device option and refresh the option table.
    pub async fn set_info(&mut self, key: &str, value: &str) -> Result<()> {
        let payload = format!("{key}={value}\0");
        let reply = self
            .send_and_receive(CMD_OPTIONS_WRQ, payload.as_bytes())
            .await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "set device info",
                ack: reply.code,
            });
        }

        // second ack is not checked; some firmwares answer refresh with data
        self.send_and_receive(CMD_REFRESH_OPTION, &[]).await?;

        Ok(())
    }

    /// Read record counts and capacities from the status block.
    pub async fn read_sizes(&mut self) -> Result<DeviceStatus> {
        let reply = self.send_and_receive(CMD_GET_FREE_SIZES, &[]).await?;

        let data = &reply.data;
        if data.len() < status_offset::ATTLOG_CAPACITY + 4 {
            return Err(Error::malformed(format!(
                "free sizes block too short: {} bytes",
                data.len()
            )));
        }

        let read_u32 = |offset: usize| {
            u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
        };

        Ok(DeviceStatus {
            users: read_u32(status_offset::USER_COUNT),
            fingerprints: read_u32(status_offset::FP_COUNT),
            attendance_records: read_u32(status_offset::ATTLOG_COUNT),
            operation_records: read_u32(status_offset::OPLOG_COUNT),
            admins: read_u32(status_offset::ADMIN_COUNT),
            passwords: read_u32(status_offset::PWD_COUNT),
            fingerprint_capacity: read_u32(status_offset::FP_CAPACITY),
            user_capacity: read_u32(status_offset::USER_CAPACITY),
            attendance_capacity: read_u32(status_offset::ATTLOG_CAPACITY),
        })
    }

    /// Receive one real-time frame with a short deadline.
    ///
    /// Returns `None` on deadline expiry or an undecodable frame; both are
    /// liveness ticks for the listener. Each decoded event is acknowledged
    /// with an OK frame built from the cached session state.
    pub(crate) async fn receive_event(&mut self, deadline: Duration) -> Result<Option<Event>> {
        let raw = match self.receive_raw(4096, Some(deadline)).await {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => return Ok(None),
            Err(e) => return Err(e),
        };

        let packet = match Packet::decode(&raw) {
            Ok(p) => p,
            Err(e) => {
                debug!("dropping undecodable event frame: {e}");
                return Ok(None);
            }
        };

        self.send_command(CMD_ACK_OK, &[]).await?;

        Ok(Some(Event {
            event_type: packet.session,
            data: packet.data,
        }))
    }
}

/// Decode bytes as text with trailing NUL padding removed.
fn trim_nul(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

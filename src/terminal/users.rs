//! User catalog: record layout, enumeration, fingerprint templates and
//! verification modes.

use std::collections::HashMap;

use tracing::debug;

use super::Terminal;
use crate::error::{Error, Result};
use crate::proto::consts::{
    CMD_DATA_WRRQ, CMD_DEL_FPTMP, CMD_DELETE_USER, CMD_USER_WRQ, CMD_USERTEMP_RRQ, CMD_VERIFY_RRQ,
    CMD_VERIFY_WRQ,
};
use crate::proto::VerificationKind;

/// Serial numbers are assigned from `[0, MAX_USER_SN)`.
pub const MAX_USER_SN: u16 = 10_000;

/// On-wire user record length.
const USER_RECORD_LEN: usize = 72;

/// Table read request for the user dataset.
const USERS_REQUEST: [u8; 11] = [0x01, 0x09, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Table read request for the fingerprint template dataset.
const TEMPLATES_REQUEST: [u8; 11] =
    [0x01, 0x07, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// One fingerprint template attached to a user slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpTemplate {
    pub index: u8,
    pub flag: u8,
    pub template: Vec<u8>,
}

/// A user registered on the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    /// Internal serial number, the device's primary key.
    pub serial: u16,
    /// External user id, at most 8 ASCII characters.
    pub user_id: String,
    pub name: String,
    pub password: String,
    pub card_no: u32,
    pub admin_level: u8,
    pub enabled: bool,
    pub group: u8,
    pub timezones: Option<[u16; 3]>,

    pub(crate) templates: HashMap<u8, FpTemplate>,
}

impl User {
    /// Encode into the 72-byte wire record.
    pub fn encode(&self) -> [u8; USER_RECORD_LEN] {
        let mut record = [0u8; USER_RECORD_LEN];

        record[0..2].copy_from_slice(&self.serial.to_le_bytes());
        record[2] = (self.admin_level << 1) | u8::from(!self.enabled);

        copy_padded(&mut record[3..11], self.password.as_bytes());
        copy_padded(&mut record[11..35], self.name.as_bytes());

        record[35..39].copy_from_slice(&self.card_no.to_le_bytes());
        record[39] = self.group;

        if let Some(timezones) = &self.timezones {
            record[40..42].copy_from_slice(&1u16.to_le_bytes());
            for (i, tz) in timezones.iter().enumerate() {
                record[42 + i * 2..44 + i * 2].copy_from_slice(&tz.to_le_bytes());
            }
        }

        copy_padded(&mut record[48..57], self.user_id.as_bytes());

        record
    }

    /// Decode a 72-byte wire record.
    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() != USER_RECORD_LEN {
            return Err(Error::InvalidUserEntry(record.len()));
        }

        let permission = record[2];
        let timezones = if u16::from_le_bytes([record[40], record[41]]) == 1 {
            Some([
                u16::from_le_bytes([record[42], record[43]]),
                u16::from_le_bytes([record[44], record[45]]),
                u16::from_le_bytes([record[46], record[47]]),
            ])
        } else {
            None
        };

        Ok(Self {
            serial: u16::from_le_bytes([record[0], record[1]]),
            user_id: trim_padded(&record[48..57]),
            name: trim_padded(&record[11..35]),
            password: if record[3] != 0 {
                trim_padded(&record[3..11])
            } else {
                String::new()
            },
            card_no: u32::from_le_bytes([record[35], record[36], record[37], record[38]]),
            admin_level: permission >> 1,
            enabled: permission & 1 == 0,
            group: record[39],
            timezones,
            templates: HashMap::new(),
        })
    }

    /// Attach a fingerprint template to this user.
    pub fn set_template(&mut self, template: FpTemplate) {
        self.templates.insert(template.index, template);
    }

    /// Fingerprint template at `index`, when loaded.
    pub fn template(&self, index: u8) -> Option<&FpTemplate> {
        self.templates.get(&index)
    }

    /// All loaded fingerprint templates.
    pub fn templates(&self) -> impl Iterator<Item = &FpTemplate> {
        self.templates.values()
    }
}

fn copy_padded(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

fn trim_padded(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_matches('\0')
        .to_string()
}

/// Query interface over the users registered on one terminal.
///
/// The catalog lazily mirrors the device's user table in memory on first
/// use; mutating operations that change device records refresh the mirror.
pub struct UserCatalog<'a> {
    terminal: &'a mut Terminal,
    users: Option<HashMap<u16, User>>,
}

impl<'a> UserCatalog<'a> {
    pub fn new(terminal: &'a mut Terminal) -> Self {
        Self {
            terminal,
            users: None,
        }
    }

    /// Fetch the full user table into the local mirror.
    async fn read_all_users(&mut self) -> Result<()> {
        self.terminal.send_command(CMD_DATA_WRRQ, &USERS_REQUEST).await?;
        let reply = self.terminal.receive_long_reply(1024).await?;

        let dataset = &reply.data;
        if dataset.len() < 5 {
            return Err(Error::malformed(format!(
                "user dataset too short: {} bytes",
                dataset.len()
            )));
        }

        let mut users = HashMap::new();

        // dataset begins with a 4-byte size prefix
        let mut i = 4;
        while i + USER_RECORD_LEN <= dataset.len() {
            let user = User::decode(&dataset[i..i + USER_RECORD_LEN])?;
            users.insert(user.serial, user);
            i += USER_RECORD_LEN;
        }

        debug!(count = users.len(), "user table loaded");
        self.users = Some(users);

        Ok(())
    }

    /// Fetch all fingerprint templates and attach them to the mirror.
    ///
    /// Each entry is a 2-byte total length (template length + 6), the owner
    /// serial, a slot index and a flag, followed by the template bytes.
    pub async fn read_all_fingerprint_templates(&mut self) -> Result<()> {
        self.ensure_loaded().await?;

        self.terminal
            .send_command(CMD_DATA_WRRQ, &TEMPLATES_REQUEST)
            .await?;
        let reply = self.terminal.receive_long_reply(1024).await?;

        let dataset = &reply.data;
        if dataset.len() < 5 {
            return Err(Error::malformed(format!(
                "fingerprint dataset too short: {} bytes",
                dataset.len()
            )));
        }

        let users = self.users.get_or_insert_with(HashMap::new);

        let mut i = 4;
        while i + 6 <= dataset.len() {
            let total = u16::from_le_bytes([dataset[i], dataset[i + 1]]) as usize;
            if total < 6 || i + total > dataset.len() {
                return Err(Error::malformed("fingerprint entry overruns dataset"));
            }

            let serial = u16::from_le_bytes([dataset[i + 2], dataset[i + 3]]);
            let template = FpTemplate {
                index: dataset[i + 4],
                flag: dataset[i + 5],
                template: dataset[i + 6..i + total].to_vec(),
            };

            if let Some(user) = users.get_mut(&serial) {
                user.set_template(template);
            }

            i += total;
        }

        Ok(())
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.users.is_none() {
            self.read_all_users().await?;
        }

        Ok(())
    }

    /// Users whose display name contains `keyword`, case-insensitively.
    pub async fn find_by_name(&mut self, keyword: &str) -> Result<Vec<User>> {
        self.ensure_loaded().await?;

        let needle = keyword.to_lowercase();
        let users = self.users.as_ref().map(|m| {
            m.values()
                .filter(|u| u.name.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        });

        Ok(users.unwrap_or_default())
    }

    /// All users on the device.
    pub async fn find_all(&mut self) -> Result<Vec<User>> {
        self.find_by_name("").await
    }

    /// Translate an external user id into its internal serial.
    fn serial_of(&self, user_id: &str) -> Option<u16> {
        self.users.as_ref().and_then(|users| {
            users
                .values()
                .find(|u| u.user_id.eq_ignore_ascii_case(user_id))
                .map(|u| u.serial)
        })
    }

    async fn require_serial(&mut self, user_id: &str) -> Result<u16> {
        self.ensure_loaded().await?;
        self.serial_of(user_id)
            .ok_or_else(|| Error::UnknownUserId(user_id.to_string()))
    }

    /// Read a user's verification mode.
    pub async fn get_verification_mode(&mut self, user_id: &str) -> Result<VerificationKind> {
        let serial = self.require_serial(user_id).await?;

        let reply = self
            .terminal
            .send_and_receive(CMD_VERIFY_RRQ, &serial.to_le_bytes())
            .await?;

        if reply.data.len() < 3 {
            return Err(Error::InvalidVerifyResponse);
        }

        Ok(VerificationKind(reply.data[2]))
    }

    /// Override a user's verification mode.
    pub async fn set_verification_mode(
        &mut self,
        user_id: &str,
        kind: VerificationKind,
    ) -> Result<()> {
        let serial = self.require_serial(user_id).await?;

        let mut data = [0u8; 24];
        data[0..2].copy_from_slice(&serial.to_le_bytes());
        data[2] = kind.0;

        let reply = self.terminal.send_and_receive(CMD_VERIFY_WRQ, &data).await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "set verification mode",
                ack: reply.code,
            });
        }

        Ok(())
    }

    /// Register a new user on the device.
    ///
    /// A zero serial is replaced with the lowest free one; the mirror is
    /// refreshed afterwards so the new record is immediately visible.
    pub async fn create_user(&mut self, mut user: User) -> Result<()> {
        self.ensure_loaded().await?;

        if user.serial == 0 && self.users.as_ref().is_some_and(|u| u.contains_key(&0)) {
            user.serial = self.next_free_sn().await?;
        }

        let record = user.encode();
        let reply = self.terminal.send_and_receive(CMD_USER_WRQ, &record).await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "create user",
                ack: reply.code,
            });
        }

        self.read_all_users().await
    }

    /// Remove a user record from the device.
    pub async fn delete_user(&mut self, user_id: &str) -> Result<()> {
        let serial = self.require_serial(user_id).await?;

        let reply = self
            .terminal
            .send_and_receive(CMD_DELETE_USER, &serial.to_le_bytes())
            .await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "delete user",
                ack: reply.code,
            });
        }

        if let Some(users) = self.users.as_mut() {
            users.remove(&serial);
        }

        Ok(())
    }

    /// Download one fingerprint template from the device.
    pub async fn download_fingerprint(&mut self, user_id: &str, index: u8) -> Result<Vec<u8>> {
        let serial = self.require_serial(user_id).await?;

        let mut data = [0u8; 3];
        data[0..2].copy_from_slice(&serial.to_le_bytes());
        data[2] = index;

        self.terminal.send_command(CMD_USERTEMP_RRQ, &data).await?;
        let reply = self.terminal.receive_long_reply(1024).await?;

        Ok(reply.data)
    }

    /// Delete one fingerprint template from the device and the mirror.
    pub async fn delete_fingerprint(&mut self, user_id: &str, index: u8) -> Result<()> {
        let serial = self.require_serial(user_id).await?;

        let mut data = [0u8; 25];
        copy_padded(&mut data[0..24], user_id.as_bytes());
        data[24] = index;

        let reply = self.terminal.send_and_receive(CMD_DEL_FPTMP, &data).await?;
        if !reply.is_ok() {
            return Err(Error::CommandRejected {
                op: "delete fingerprint",
                ack: reply.code,
            });
        }

        if let Some(user) = self.users.as_mut().and_then(|users| users.get_mut(&serial)) {
            user.templates.remove(&index);
        }

        Ok(())
    }

    /// Lowest serial not currently assigned.
    ///
    /// Deleting users leaves holes, so free numbers are not contiguous;
    /// the whole range is scanned from the bottom.
    pub async fn next_free_sn(&mut self) -> Result<u16> {
        self.ensure_loaded().await?;

        let users = self.users.as_ref();
        for sn in 0..MAX_USER_SN {
            if users.map(|m| !m.contains_key(&sn)).unwrap_or(true) {
                return Ok(sn);
            }
        }

        Ok(0)
    }
}

use crate::crypto::BLOCK_LEN;
use crate::error::VaultError;
use std::borrow::Cow;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Title field length: exactly two cipher blocks, so a title can be
/// decrypted without touching the rest of the record.
pub const TITLE_LEN: usize = 2 * BLOCK_LEN;

/// Data blob length, chosen so the whole record is a multiple of the
/// cipher block size.
pub const DATA_LEN: usize = 79;

/// Plaintext record length: title + secret offset + data blob (7 blocks).
pub const ENTRY_LEN: usize = TITLE_LEN + 1 + DATA_LEN;

/// Returns the prefix of `bytes` up to the first NUL.
pub(crate) fn cstr(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(n) => &bytes[..n],
        None => bytes,
    }
}

/// A record's NUL-padded title field.
///
/// Ordering is plain byte-value comparison, which is also the order the
/// entry table is kept in on disk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Title([u8; TITLE_LEN]);

impl Title {
    pub(crate) fn from_bytes(bytes: [u8; TITLE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TITLE_LEN] {
        &self.0
    }

    /// The title as text. Corrupted records decode lossily rather than
    /// erroring; garbage in, garbage out.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(cstr(&self.0))
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One credential record in its transient plaintext form.
///
/// On disk this exists only as ciphertext; in memory it is wiped on drop.
/// The data blob holds `login NUL secret NUL`, with the secret's start
/// position stored so it can be found without scanning.
pub struct Entry {
    title: [u8; TITLE_LEN],
    secret_offset: u8,
    data: [u8; DATA_LEN],
}

impl Entry {
    /// Builds a record from its three fields.
    ///
    /// # Errors
    ///
    /// `FieldTooLong` when the title exceeds 31 bytes or login + secret
    /// (with their terminators) exceed the data blob.
    pub fn new(title: &str, login: &str, secret: &str) -> Result<Self, VaultError> {
        if title.len() >= TITLE_LEN {
            return Err(VaultError::FieldTooLong("title"));
        }
        if login.len() + secret.len() + 2 > DATA_LEN {
            return Err(VaultError::FieldTooLong("login and secret"));
        }

        let mut e = Self {
            title: [0u8; TITLE_LEN],
            secret_offset: (login.len() + 1) as u8,
            data: [0u8; DATA_LEN],
        };
        e.title[..title.len()].copy_from_slice(title.as_bytes());
        e.data[..login.len()].copy_from_slice(login.as_bytes());
        e.data[login.len() + 1..login.len() + 1 + secret.len()]
            .copy_from_slice(secret.as_bytes());
        Ok(e)
    }

    pub fn title(&self) -> Title {
        Title(self.title)
    }

    pub(crate) fn title_bytes(&self) -> &[u8; TITLE_LEN] {
        &self.title
    }

    pub fn login(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(cstr(&self.data))
    }

    pub fn secret(&self) -> Cow<'_, str> {
        // Clamp so a corrupted offset cannot read out of bounds.
        let start = (self.secret_offset as usize).min(DATA_LEN);
        String::from_utf8_lossy(cstr(&self.data[start..]))
    }

    pub(crate) fn to_bytes(&self) -> Zeroizing<[u8; ENTRY_LEN]> {
        let mut buf = Zeroizing::new([0u8; ENTRY_LEN]);
        buf[..TITLE_LEN].copy_from_slice(&self.title);
        buf[TITLE_LEN] = self.secret_offset;
        buf[TITLE_LEN + 1..].copy_from_slice(&self.data);
        buf
    }

    pub(crate) fn from_bytes(buf: &[u8; ENTRY_LEN]) -> Self {
        let mut title = [0u8; TITLE_LEN];
        let mut data = [0u8; DATA_LEN];
        title.copy_from_slice(&buf[..TITLE_LEN]);
        data.copy_from_slice(&buf[TITLE_LEN + 1..]);
        Self {
            title,
            secret_offset: buf[TITLE_LEN],
            data,
        }
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.title.zeroize();
        self.secret_offset.zeroize();
        self.data.zeroize();
    }
}

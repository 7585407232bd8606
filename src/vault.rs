//! The encrypted storage engine: store header, master-passphrase
//! verification, and the ordered entry table.

use crate::crypto::{self, CbcCipher, IV_LEN, KEY_LEN};
use crate::eeprom::{Eeprom, Medium};
use crate::entry::{self, Entry, ENTRY_LEN, TITLE_LEN, Title};
use crate::error::VaultError;
use zeroize::Zeroizing;

// Store layout, offsets from the image base:
//   0..12     magic identifier
//   12..44    device name (cleartext)
//   44..60    master IV
//   60..92    master verifier ciphertext
//   92..124   background noise (cleartext)
//   124       entry counter
//   1280..    entry table: 64 slots of 16-byte IV + 112-byte ciphertext

const MAGIC_LEN: usize = 12;
const MAGIC: &[u8; MAGIC_LEN] = b"[*KeyFort*]\0";
const MAGIC_ADDR: u32 = 0;

const NAME_ADDR: u32 = 12;
/// Length of the cleartext device-name header field.
pub const NAME_LEN: usize = 32;

const MASTER_IV_ADDR: u32 = 44;
const VERIFIER_ADDR: u32 = 60;
const VERIFIER_LEN: usize = 32;
const NOISE_ADDR: u32 = 92;
const NOISE_LEN: usize = 32;
const COUNTER_ADDR: u32 = 124;

const TABLE_ADDR: u32 = 1280;
const SLOT_LEN: u32 = (IV_LEN + ENTRY_LEN) as u32;

/// Number of entry slots in a store.
pub const CAPACITY: u8 = 64;

/// An all-zero IV marks a slot as empty; the allocator never produces it.
const EMPTY_IV: [u8; IV_LEN] = [0u8; IV_LEN];

fn slot_addr(index: u8) -> u32 {
    TABLE_ADDR + SLOT_LEN * index as u32
}

/// A master passphrase, zero-padded to the cipher key length.
///
/// The value is consumed by the operation it is handed to and wiped on
/// drop; callers cannot retain or reuse it through this API.
pub struct Passphrase(Zeroizing<[u8; KEY_LEN]>);

impl Passphrase {
    pub fn new(text: &str) -> Result<Self, VaultError> {
        if text.len() > KEY_LEN {
            return Err(VaultError::FieldTooLong("passphrase"));
        }
        let mut buf = Zeroizing::new([0u8; KEY_LEN]);
        buf[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self(buf))
    }

    fn into_key(self) -> Zeroizing<[u8; KEY_LEN]> {
        self.0
    }
}

/// The storage engine over one nonvolatile store image.
///
/// A `Vault` starts locked. `read_header` tells whether the image has ever
/// been formatted; `unlock` (or `format`) keys the cipher for the session;
/// the entry operations then work against the on-image table. There is
/// exactly one logical owner of a store and no concurrent access.
pub struct Vault<M: Medium> {
    eeprom: Eeprom<M>,
    cipher: CbcCipher,
    nb_entries: u8,
}

impl<M: Medium> Vault<M> {
    pub fn new(medium: M) -> Self {
        Self {
            eeprom: Eeprom::new(medium),
            cipher: CbcCipher::new(),
            nb_entries: 0,
        }
    }

    /// Consumes the vault and returns its medium.
    pub fn into_medium(self) -> M {
        self.eeprom.into_inner()
    }

    // --------------------------------------------------
    // Header
    // --------------------------------------------------

    /// Checks the store identity and, when present, returns the device
    /// name and loads the persisted entry counter.
    ///
    /// `None` means the image was never formatted; every other operation
    /// is meaningless until `format` runs.
    pub fn read_header(&mut self) -> Result<Option<String>, VaultError> {
        let mut magic = [0u8; MAGIC_LEN];
        self.eeprom.read(MAGIC_ADDR, &mut magic)?;
        if &magic != MAGIC {
            return Ok(None);
        }

        let mut name = [0u8; NAME_LEN];
        self.eeprom.read(NAME_ADDR, &mut name)?;

        let mut counter = [0u8];
        self.eeprom.read(COUNTER_ADDR, &mut counter)?;
        self.nb_entries = counter[0].min(CAPACITY);

        Ok(Some(
            String::from_utf8_lossy(entry::cstr(&name)).into_owned(),
        ))
    }

    /// Formats the store: erases every slot, derives fresh
    /// master-passphrase state, writes identity and device name, and
    /// zeroes the entry counter. Not resumable once started.
    pub fn format(&mut self, passphrase: Passphrase, device_name: &str) -> Result<(), VaultError> {
        if device_name.len() > NAME_LEN {
            return Err(VaultError::FieldTooLong("device name"));
        }

        // Every slot gets the same on-image shape a deleted entry has, so
        // a fresh store is indistinguishable from a used one.
        for index in 0..CAPACITY {
            self.erase_slot(index)?;
        }

        self.set_master_passphrase(passphrase)?;

        self.eeprom.write(MAGIC_ADDR, MAGIC)?;
        let mut name = [0u8; NAME_LEN];
        name[..device_name.len()].copy_from_slice(device_name.as_bytes());
        self.eeprom.write(NAME_ADDR, &name)?;

        self.nb_entries = 0;
        self.persist_counter()
    }

    /// Verifies a candidate passphrase against the stored verifier.
    ///
    /// On success the cipher stays keyed for the session. A wrong
    /// passphrase and a corrupted header are deliberately
    /// indistinguishable; both return `false`.
    pub fn unlock(&mut self, passphrase: Passphrase) -> Result<bool, VaultError> {
        let mut iv = [0u8; IV_LEN];
        let next = self.eeprom.read(MASTER_IV_ADDR, &mut iv)?;
        let mut verifier = [0u8; VERIFIER_LEN];
        let next = self.eeprom.read(next, &mut verifier)?;
        let mut noise = [0u8; NOISE_LEN];
        self.eeprom.read(next, &mut noise)?;

        let mut key = passphrase.into_key();
        for (k, n) in key.iter_mut().zip(noise) {
            *k ^= n;
        }

        self.cipher.set_key(&key);
        let mut check = Zeroizing::new([0u8; VERIFIER_LEN]);
        self.cipher.decrypt(&verifier, &mut check[..], &iv)?;

        if check[..] == key[..] {
            Ok(true)
        } else {
            self.cipher.clear();
            Ok(false)
        }
    }

    /// Clears the session key material.
    pub fn lock(&mut self) {
        self.cipher.clear();
    }

    /// Rewrites the cleartext device-name field.
    pub fn set_device_name(&mut self, device_name: &str) -> Result<(), VaultError> {
        if device_name.len() > NAME_LEN {
            return Err(VaultError::FieldTooLong("device name"));
        }
        let mut name = [0u8; NAME_LEN];
        name[..device_name.len()].copy_from_slice(device_name.as_bytes());
        self.eeprom.write(NAME_ADDR, &name)?;
        Ok(())
    }

    /// Replaces the master passphrase, re-encrypting every entry under the
    /// new key with fresh IVs. Requires an unlocked store; order and
    /// titles are unchanged.
    pub fn change_passphrase(&mut self, new: Passphrase) -> Result<(), VaultError> {
        if !self.cipher.is_keyed() {
            return Err(VaultError::Locked);
        }

        // Pull every record out under the old key before any state changes.
        let mut entries = Vec::with_capacity(self.nb_entries as usize);
        for index in 0..self.nb_entries {
            if let Some(e) = self.get_entry(index)? {
                entries.push(e);
            }
        }

        self.set_master_passphrase(new)?;

        for (index, e) in entries.iter().enumerate() {
            self.put_entry(index as u8, e)?;
        }
        Ok(())
    }

    /// Derives and persists the verification state for a new master
    /// passphrase: noise, master IV, and the self-encrypted verifier.
    ///
    /// The stored verifier is the noise-obfuscated passphrase encrypted
    /// under itself; with per-device random noise as the plaintext there
    /// is no fixed known plaintext to attack, and correctness can only be
    /// checked by supplying the right passphrase.
    fn set_master_passphrase(&mut self, passphrase: Passphrase) -> Result<(), VaultError> {
        // Two IV-grade draws make up the background noise.
        let mut noise = [0u8; NOISE_LEN];
        let half = self.allocate_iv()?;
        noise[..IV_LEN].copy_from_slice(&half);
        let half = self.allocate_iv()?;
        noise[IV_LEN..].copy_from_slice(&half);

        let mut key = passphrase.into_key();
        for (k, n) in key.iter_mut().zip(noise) {
            *k ^= n;
        }

        let iv = self.allocate_iv()?;
        self.eeprom.write(MASTER_IV_ADDR, &iv)?;

        self.cipher.set_key(&key);
        let mut verifier = [0u8; VERIFIER_LEN];
        self.cipher.encrypt(&key[..], &mut verifier, &iv)?;
        self.eeprom.write(VERIFIER_ADDR, &verifier)?;
        self.eeprom.write(NOISE_ADDR, &noise)?;
        Ok(())
    }

    // --------------------------------------------------
    // Entry table
    // --------------------------------------------------

    /// Number of occupied slots.
    pub fn nb_entries(&self) -> u8 {
        self.nb_entries
    }

    /// Decrypts and returns the title of the entry at `index`.
    ///
    /// Only the two title blocks are read and decrypted; in CBC mode a
    /// leading prefix decrypts without the rest of the record, which keeps
    /// listing proportional to title size rather than record size.
    pub fn get_title(&mut self, index: u8) -> Result<Option<Title>, VaultError> {
        if index >= self.nb_entries {
            return Ok(None);
        }
        let (iv, data_addr) = self.read_slot_iv(index)?;
        if iv == EMPTY_IV {
            return Ok(None);
        }

        let mut ciphertext = [0u8; TITLE_LEN];
        self.eeprom.read(data_addr, &mut ciphertext)?;

        let mut title = [0u8; TITLE_LEN];
        self.cipher.decrypt(&ciphertext, &mut title, &iv)?;
        Ok(Some(Title::from_bytes(title)))
    }

    /// Decrypts and returns the whole entry at `index`.
    pub fn get_entry(&mut self, index: u8) -> Result<Option<Entry>, VaultError> {
        if index >= self.nb_entries {
            return Ok(None);
        }
        let (iv, data_addr) = self.read_slot_iv(index)?;
        if iv == EMPTY_IV {
            return Ok(None);
        }

        let mut ciphertext = [0u8; ENTRY_LEN];
        self.eeprom.read(data_addr, &mut ciphertext)?;

        let mut plain = Zeroizing::new([0u8; ENTRY_LEN]);
        self.cipher.decrypt(&ciphertext, &mut plain[..], &iv)?;
        Ok(Some(Entry::from_bytes(&plain)))
    }

    /// Inserts an entry at its sorted position and returns the index.
    ///
    /// # Errors
    ///
    /// `Full` when the table is at capacity (the table is untouched),
    /// `Locked` before a successful unlock.
    pub fn insert_entry(&mut self, entry: &Entry) -> Result<u8, VaultError> {
        if !self.cipher.is_keyed() {
            return Err(VaultError::Locked);
        }
        if self.nb_entries >= CAPACITY {
            return Err(VaultError::Full);
        }

        // First slot whose title sorts after the new one; default is to
        // append.
        let mut position = self.nb_entries;
        for index in 0..self.nb_entries {
            if let Some(title) = self.get_title(index)? {
                if title.as_bytes() > entry.title_bytes() {
                    position = index;
                    break;
                }
            }
        }

        // Open the gap from the top down. Slots move as raw bytes; each
        // slot's IV travels with its ciphertext, so nothing is
        // re-encrypted.
        for index in (position..self.nb_entries).rev() {
            self.copy_slot(index, index + 1)?;
        }

        self.put_entry(position, entry)?;
        self.nb_entries += 1;
        self.persist_counter()?;
        Ok(position)
    }

    /// Removes the entry at `index` and compacts the table. Out-of-range
    /// indices are a no-op.
    pub fn remove_entry(&mut self, index: u8) -> Result<(), VaultError> {
        if index >= self.nb_entries {
            return Ok(());
        }

        self.erase_slot(index)?;

        // Close the gap, then erase the stale copy of the last slot.
        for i in index + 1..self.nb_entries {
            self.copy_slot(i, i - 1)?;
        }
        if index + 1 < self.nb_entries {
            self.erase_slot(self.nb_entries - 1)?;
        }

        self.nb_entries -= 1;
        self.persist_counter()
    }

    // --------------------------------------------------
    // Slot primitives
    // --------------------------------------------------

    /// Writes one record into a slot: fresh unique IV, then the record
    /// encrypted under it. Maintains neither the counter nor sort order;
    /// that is the caller's job.
    fn put_entry(&mut self, index: u8, entry: &Entry) -> Result<(), VaultError> {
        let iv = self.allocate_iv()?;

        let plain = entry.to_bytes();
        let mut ciphertext = [0u8; ENTRY_LEN];
        self.cipher.encrypt(&plain[..], &mut ciphertext, &iv)?;

        let data_addr = self.eeprom.write(slot_addr(index), &iv)?;
        self.eeprom.write(data_addr, &ciphertext)?;
        Ok(())
    }

    /// Erases a slot: sentinel IV first, then random bytes over the
    /// ciphertext region so an erased slot carries no recognizable
    /// pattern.
    fn erase_slot(&mut self, index: u8) -> Result<(), VaultError> {
        let data_addr = self.eeprom.write(slot_addr(index), &EMPTY_IV)?;
        let mut noise = [0u8; ENTRY_LEN];
        crypto::fill_random(&mut noise)?;
        self.eeprom.write(data_addr, &noise)?;
        Ok(())
    }

    /// Moves a whole slot (IV + ciphertext) as raw bytes.
    fn copy_slot(&mut self, from: u8, to: u8) -> Result<(), VaultError> {
        let mut slot = [0u8; SLOT_LEN as usize];
        self.eeprom.read(slot_addr(from), &mut slot)?;
        self.eeprom.write(slot_addr(to), &slot)?;
        Ok(())
    }

    fn read_slot_iv(&mut self, index: u8) -> Result<([u8; IV_LEN], u32), VaultError> {
        let mut iv = [0u8; IV_LEN];
        let data_addr = self.eeprom.read(slot_addr(index), &mut iv)?;
        Ok((iv, data_addr))
    }

    fn persist_counter(&mut self) -> Result<(), VaultError> {
        self.eeprom.write(COUNTER_ADDR, &[self.nb_entries])?;
        Ok(())
    }

    /// Draws a fresh IV that is not the empty sentinel, not the master IV,
    /// and not in use by any slot. Linear scan per draw; there is no
    /// auxiliary index to consult.
    fn allocate_iv(&mut self) -> Result<[u8; IV_LEN], VaultError> {
        'draw: loop {
            let mut iv = [0u8; IV_LEN];
            crypto::fill_random(&mut iv)?;

            if iv == EMPTY_IV {
                continue;
            }

            let mut master = [0u8; IV_LEN];
            self.eeprom.read(MASTER_IV_ADDR, &mut master)?;
            if iv == master {
                continue;
            }

            for index in 0..CAPACITY {
                if self.read_slot_iv(index)?.0 == iv {
                    continue 'draw;
                }
            }

            return Ok(iv);
        }
    }
}

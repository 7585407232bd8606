mod crypto;
mod eeprom;
mod entry;
mod error;
mod vault;

pub use crate::crypto::random_password;
pub use crate::eeprom::{Eeprom, FileMedium, IMAGE_LEN, Medium, MemoryMedium};
pub use crate::entry::{Entry, Title};
pub use crate::error::VaultError;
pub use crate::vault::{CAPACITY, NAME_LEN, Passphrase, Vault};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Default location of the store image in the platform data directory.
pub fn default_image_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "keyfort")?;
    Some(project_dirs.data_dir().join("keyfort.img"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pass(text: &str) -> Passphrase {
        Passphrase::new(text).unwrap()
    }

    #[test]
    fn full_session_over_a_file_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyfort.img");

        let mut vault = Vault::new(FileMedium::create(&path).unwrap());
        vault.format(pass("tr0ub4dor"), "POCKETDEV").unwrap();
        vault
            .insert_entry(&Entry::new("mail", "alice", "hunter2").unwrap())
            .unwrap();
        drop(vault);

        let mut vault = Vault::new(FileMedium::open(&path).unwrap());
        assert_eq!(vault.read_header().unwrap().unwrap(), "POCKETDEV");
        assert_eq!(vault.nb_entries(), 1);
        assert!(vault.unlock(pass("tr0ub4dor")).unwrap());

        let e = vault.get_entry(0).unwrap().unwrap();
        assert_eq!(e.title().as_str(), "mail");
        assert_eq!(e.login(), "alice");
        assert_eq!(e.secret(), "hunter2");
    }

    #[test]
    fn wrong_passphrase_over_a_file_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyfort.img");

        let mut vault = Vault::new(FileMedium::create(&path).unwrap());
        vault.format(pass("correct"), "DEV").unwrap();
        drop(vault);

        let mut vault = Vault::new(FileMedium::open(&path).unwrap());
        vault.read_header().unwrap();
        assert!(!vault.unlock(pass("wrong")).unwrap());
    }

    #[test]
    fn blank_image_reports_uninitialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyfort.img");

        let mut vault = Vault::new(FileMedium::create(&path).unwrap());
        assert!(vault.read_header().unwrap().is_none());
    }

    #[test]
    fn secrets_are_not_stored_in_cleartext() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyfort.img");

        let mut vault = Vault::new(FileMedium::create(&path).unwrap());
        vault.format(pass("orpheus-descends"), "DEV").unwrap();
        vault
            .insert_entry(&Entry::new("site", "plainlogin", "plainsecret").unwrap())
            .unwrap();
        drop(vault);

        let image = std::fs::read(&path).unwrap();
        let contains = |needle: &[u8]| image.windows(needle.len()).any(|w| w == needle);
        assert!(!contains(b"plainlogin"));
        assert!(!contains(b"plainsecret"));
        assert!(!contains(b"orpheus-descends"));
    }
}

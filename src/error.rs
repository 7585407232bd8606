use std::{fmt, io};

#[derive(Debug)]
pub enum VaultError {
    Uninitialized,
    Locked,
    Full,
    FieldTooLong(&'static str),
    Entropy,
    Io(io::Error),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::Uninitialized => write!(f, "store has not been formatted"),
            VaultError::Locked => write!(f, "store is locked"),
            VaultError::Full => write!(f, "entry table is full"),
            VaultError::FieldTooLong(field) => write!(f, "{field} is too long"),
            VaultError::Entropy => write!(f, "OS random generator unavailable"),
            VaultError::Io(e) => write!(f, "storage transfer failed: {e}"),
        }
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VaultError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VaultError {
    fn from(e: io::Error) -> Self {
        VaultError::Io(e)
    }
}

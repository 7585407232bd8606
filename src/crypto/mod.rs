//! Cryptographic primitives for the store.
//!
//! Provides the CBC block cipher and the entropy source.

pub mod cbc;
pub mod rng;

pub use cbc::CbcCipher;
pub use rng::{fill_random, random_byte, random_password};

/// Cipher block length (16 bytes).
pub const BLOCK_LEN: usize = 16;
/// Length of an initialization vector (one cipher block).
pub const IV_LEN: usize = 16;
/// Length of the cipher key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;

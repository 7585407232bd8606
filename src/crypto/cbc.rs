use super::{BLOCK_LEN, IV_LEN, KEY_LEN};
use crate::error::VaultError;
use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// AES-256 in CBC mode over whole 16-byte blocks.
///
/// The chaining is done here rather than through a mode crate because the
/// store decrypts record prefixes: block `k` of a CBC ciphertext needs only
/// block `k-1` (or the IV) to decrypt, so a title can be recovered without
/// reading the rest of the record.
///
/// The key schedule is wiped on [`clear`](Self::clear) and on drop.
#[derive(Default)]
pub struct CbcCipher {
    aes: Option<Aes256>,
}

impl CbcCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a 256-bit key, replacing any previous one.
    pub fn set_key(&mut self, key: &[u8; KEY_LEN]) {
        self.aes = Some(Aes256::new(GenericArray::from_slice(key)));
    }

    /// Drops the key material.
    pub fn clear(&mut self) {
        self.aes = None;
    }

    pub fn is_keyed(&self) -> bool {
        self.aes.is_some()
    }

    /// CBC-encrypts `plaintext` into `out` under the loaded key.
    ///
    /// Both buffers must be the same whole-block length. The IV must be
    /// freshly generated for every call; CBC security breaks down when an
    /// IV is reused under the same key.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        out: &mut [u8],
        iv: &[u8; IV_LEN],
    ) -> Result<(), VaultError> {
        let aes = self.aes.as_ref().ok_or(VaultError::Locked)?;
        assert_eq!(plaintext.len(), out.len());
        assert_eq!(plaintext.len() % BLOCK_LEN, 0);

        let mut chain = *iv;
        for (pt, ct) in plaintext.chunks(BLOCK_LEN).zip(out.chunks_mut(BLOCK_LEN)) {
            let mut block = [0u8; BLOCK_LEN];
            for ((b, p), c) in block.iter_mut().zip(pt).zip(chain) {
                *b = p ^ c;
            }
            aes.encrypt_block(GenericArray::from_mut_slice(&mut block));
            ct.copy_from_slice(&block);
            chain = block;
        }
        Ok(())
    }

    /// CBC-decrypts `ciphertext` into `out` under the loaded key.
    ///
    /// `ciphertext` may be any whole-block prefix of a longer message
    /// encrypted under `iv`.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        out: &mut [u8],
        iv: &[u8; IV_LEN],
    ) -> Result<(), VaultError> {
        let aes = self.aes.as_ref().ok_or(VaultError::Locked)?;
        assert_eq!(ciphertext.len(), out.len());
        assert_eq!(ciphertext.len() % BLOCK_LEN, 0);

        let mut chain = *iv;
        for (ct, pt) in ciphertext.chunks(BLOCK_LEN).zip(out.chunks_mut(BLOCK_LEN)) {
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(ct);
            aes.decrypt_block(GenericArray::from_mut_slice(&mut block));
            for ((p, b), c) in pt.iter_mut().zip(block).zip(chain) {
                *p = b ^ c;
            }
            chain.copy_from_slice(ct);
        }
        Ok(())
    }
}

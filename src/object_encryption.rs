//! Password-derived object encryption.
//!
//! Commits, trees and blobs are AES-256-CBC encrypted with a key schedule
//! seeded from the user's password and an 8-byte salt stored in the backup
//! set (bucket plists use the fixed ASCII salt `BucketPL` instead):
//!
//! 1. `k1 = PBKDF2-HMAC-SHA1(password, salt, 1000 iterations, 48 bytes)`.
//! 2. Run the OpenSSL `EVP_BytesToKey` iteration over SHA-1 with 1000
//!    rounds, feeding it `k1` and the salt, until 48 bytes of key material
//!    accumulate.
//! 3. The first 32 bytes are the AES-256 key, the next 16 the CBC IV.
//!
//! There is no way to verify the password up front; a wrong password shows
//! up as an impossible PKCS#7 padding or as garbage that fails to parse.
use std::num::NonZeroU32;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::pbkdf2;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const PBKDF2_ITERATIONS: u32 = 1000;
const BYTES_TO_KEY_ITERATIONS: usize = 1000;
const AES_KEY_LEN: usize = 32;
const AES_IV_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;

/// Objects are sometimes stored with this literal prefix; it is stripped
/// before decryption when present.
const ENCRYPTED_PREFIX: &[u8] = b"encrypted";

pub fn calculate_sha1sum(message: &[u8]) -> [u8; 20] {
    let mut sha = Sha1::new();
    sha.update(message);
    sha.finalize().into()
}

/// The OpenSSL `EVP_BytesToKey` iteration:
/// `D_i = SHA1^iterations(D_(i-1) || data || salt)`, concatenated until
/// enough key material exists.
fn bytes_to_key(data: &[u8], salt: &[u8], iterations: usize, out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len + 20);
    let mut d: Vec<u8> = Vec::new();
    while out.len() < out_len {
        let mut hasher = Sha1::new();
        hasher.update(&d);
        hasher.update(data);
        hasher.update(salt);
        let mut sum = hasher.finalize();
        for _ in 1..iterations {
            let mut hasher = Sha1::new();
            hasher.update(sum);
            sum = hasher.finalize();
        }
        d = sum.to_vec();
        out.extend_from_slice(&d);
    }
    out.truncate(out_len);
    out
}

/// AES-256-CBC state derived from (password, salt); one per backup set for
/// regular objects, plus one with the fixed bucket salt.
pub struct ObjectCipher {
    key: [u8; AES_KEY_LEN],
    iv: [u8; AES_IV_LEN],
}

impl ObjectCipher {
    pub fn new(password: &[u8], salt: &[u8]) -> ObjectCipher {
        let mut k1 = [0u8; AES_KEY_LEN + AES_IV_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA1,
            NonZeroU32::new(PBKDF2_ITERATIONS).expect("iteration count is non-zero"),
            salt,
            password,
            &mut k1,
        );

        let material = bytes_to_key(&k1, salt, BYTES_TO_KEY_ITERATIONS, AES_KEY_LEN + AES_IV_LEN);
        let mut key = [0u8; AES_KEY_LEN];
        let mut iv = [0u8; AES_IV_LEN];
        key.copy_from_slice(&material[..AES_KEY_LEN]);
        iv.copy_from_slice(&material[AES_KEY_LEN..]);

        ObjectCipher { key, iv }
    }

    /// Strips the literal `encrypted` prefix when present, CBC-decrypts and
    /// removes PKCS#7 padding. Any length or padding violation maps to
    /// [`Error::BadDecrypt`].
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let data = data.strip_prefix(ENCRYPTED_PREFIX).unwrap_or(data);
        if data.is_empty() {
            return Err(Error::BadDecrypt("ciphertext is empty".to_string()));
        }
        if data.len() % AES_BLOCK_LEN != 0 {
            return Err(Error::BadDecrypt(format!(
                "ciphertext length {} is not a multiple of the AES block size",
                data.len()
            )));
        }

        let mut buffer = data.to_vec();
        let cleartext = Aes256CbcDec::new_from_slices(&self.key, &self.iv)?
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)?;
        Ok(cleartext.to_vec())
    }

    /// The write-side counterpart of [`decrypt`](Self::decrypt), without the
    /// `encrypted` prefix. The engine itself never writes to a repository;
    /// this exists so the test suite can construct one.
    pub fn encrypt(&self, cleartext: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; cleartext.len() + AES_BLOCK_LEN];
        buffer[..cleartext.len()].copy_from_slice(cleartext);
        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key, &self.iv)?
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, cleartext.len())
            .map_err(|_| Error::Cipher)?;
        Ok(ciphertext.to_vec())
    }
}

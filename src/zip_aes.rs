//! WinZip AE-2 binding: combines PBKDF2 key derivation, AES-CTR encryption,
//! and HMAC-SHA-1 authentication into the per-entry cryptographic context.

use crate::aes::{Aes, KeySize};
use crate::ctr::Ctr;
use crate::hmac::HmacSha1;
use crate::pbkdf2::pbkdf2_hmac_sha1;
use crate::rng::Pcg32;

/// PBKDF2 iteration count mandated by the WinZip AE-2 specification.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Length of the truncated HMAC-SHA-1 authentication code WinZip writes
/// after the ciphertext.
pub const AUTH_CODE_LENGTH: usize = 10;

/// AES mode byte as stored on the wire in the 0x9901 extra field: 1/2/3 for
/// AES-128/192/256. 0 means "not encrypted" and never reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    Aes128,
    Aes192,
    Aes256,
}

impl AesMode {
    pub fn key_size(self) -> KeySize {
        match self {
            AesMode::Aes128 => KeySize::Aes128,
            AesMode::Aes192 => KeySize::Aes192,
            AesMode::Aes256 => KeySize::Aes256,
        }
    }

    /// Mode byte written into the 0x9901 extra field's "AES strength" byte.
    pub fn wire_code(self) -> u8 {
        match self {
            AesMode::Aes128 => 1,
            AesMode::Aes192 => 2,
            AesMode::Aes256 => 3,
        }
    }

    pub fn salt_length(self) -> usize {
        self.key_size().bytes() / 2
    }
}

/// Per-entry AE-2 encryption context: derives keys from a password and a
/// fresh salt, then encrypts fragments while accumulating the
/// authentication HMAC over the *ciphertext*.
pub struct ZipAes {
    mode: AesMode,
    salt: Vec<u8>,
    verification_code: [u8; 2],
    ctr: Ctr,
    hmac: HmacSha1,
}

impl ZipAes {
    pub fn new(password: &str, mode: AesMode, rng: &mut Pcg32) -> Self {
        let salt_len = mode.salt_length();
        let mut salt = vec![0u8; salt_len];
        rng.fill_bytes(&mut salt);

        let key_len = mode.key_size().bytes();
        let mut derived = vec![0u8; key_len * 2 + 2];
        pbkdf2_hmac_sha1(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut derived);

        let aes_key = &derived[..key_len];
        let mac_key = &derived[key_len..key_len * 2];
        let verification_code = [derived[key_len * 2], derived[key_len * 2 + 1]];

        let cipher = Aes::new(aes_key, mode.key_size());
        let ctr = Ctr::new(cipher, &[]);
        let hmac = HmacSha1::new(mac_key);

        ZipAes {
            mode,
            salt,
            verification_code,
            ctr,
            hmac,
        }
    }

    pub fn mode(&self) -> AesMode {
        self.mode
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn verification_code(&self) -> [u8; 2] {
        self.verification_code
    }

    /// Encrypts `data` in place, then feeds the resulting ciphertext into
    /// the running authentication HMAC.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.ctr.apply(data);
        self.hmac.update(data);
    }

    /// Consumes the context and returns the truncated 10-byte HMAC tag.
    pub fn finalize(self) -> [u8; AUTH_CODE_LENGTH] {
        let mac = self.hmac.finalize();
        let mut tag = [0u8; AUTH_CODE_LENGTH];
        tag.copy_from_slice(&mac[..AUTH_CODE_LENGTH]);
        tag
    }
}

//! HMAC-SHA-1 (RFC 2104), used for AE-2 authentication and as the PRF for
//! PBKDF2.

use crate::sha1::{Sha1, BLOCK_SIZE, OUTPUT_SIZE};

pub struct HmacSha1 {
    inner: Sha1,
    outer_key: [u8; BLOCK_SIZE],
}

impl HmacSha1 {
    pub fn new(key: &[u8]) -> Self {
        let mut block_key = [0u8; BLOCK_SIZE];
        if key.len() > BLOCK_SIZE {
            let hashed = crate::sha1::sha1(key);
            block_key[..hashed.len()].copy_from_slice(&hashed);
        } else {
            block_key[..key.len()].copy_from_slice(key);
        }

        let mut inner_key = [0u8; BLOCK_SIZE];
        let mut outer_key = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            inner_key[i] = block_key[i] ^ 0x36;
            outer_key[i] = block_key[i] ^ 0x5C;
        }

        let mut inner = Sha1::new();
        inner.update(&inner_key);

        HmacSha1 { inner, outer_key }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; OUTPUT_SIZE] {
        let inner_digest = self.inner.finalize();
        let mut outer = Sha1::new();
        outer.update(&self.outer_key);
        outer.update(&inner_digest);
        outer.finalize()
    }
}

/// One-shot HMAC-SHA-1.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut mac = HmacSha1::new(key);
    mac.update(data);
    mac.finalize()
}

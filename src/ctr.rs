//! CTR (counter) mode over a 16-byte block cipher.
//!
//! The counter block is split into a fixed high-order nonce and a
//! little-endian low-order counter that increments with byte-level carry.
//! ZipAES (see [`crate::zip_aes`]) uses a zero-length nonce, so the whole
//! block is counter.

use crate::aes::Aes;

const BLOCK_LENGTH: usize = 16;

pub struct Ctr {
    cipher: Aes,
    nonce_length: usize,
    counter_block: [u8; BLOCK_LENGTH],
    mask: [u8; BLOCK_LENGTH],
    remaining_mask: usize,
}

impl Ctr {
    /// `nonce` occupies the high-order bytes of the counter block; it must
    /// leave at least one byte for the counter.
    pub fn new(cipher: Aes, nonce: &[u8]) -> Self {
        assert!(nonce.len() < BLOCK_LENGTH, "nonce leaves no room for a counter");
        let mut counter_block = [0u8; BLOCK_LENGTH];
        counter_block[BLOCK_LENGTH - nonce.len()..].copy_from_slice(nonce);
        Ctr {
            cipher,
            nonce_length: nonce.len(),
            counter_block,
            mask: [0u8; BLOCK_LENGTH],
            remaining_mask: 0,
        }
    }

    /// Resets the counter to zero and discards any buffered keystream,
    /// without touching the nonce bytes.
    pub fn reset(&mut self) {
        for b in self.counter_block[..BLOCK_LENGTH - self.nonce_length].iter_mut() {
            *b = 0;
        }
        self.remaining_mask = 0;
    }

    fn increment_counter(&mut self) {
        for b in self.counter_block[..BLOCK_LENGTH - self.nonce_length].iter_mut() {
            *b = b.wrapping_add(1);
            if *b != 0 {
                return;
            }
        }
    }

    fn refill_mask(&mut self) {
        self.increment_counter();
        self.mask = self.counter_block;
        self.cipher.encrypt_block(&mut self.mask);
        self.remaining_mask = BLOCK_LENGTH;
    }

    /// XORs the keystream into `data` in place (symmetric: encrypt == decrypt).
    pub fn apply(&mut self, data: &mut [u8]) {
        let mut offset = 0;
        while offset < data.len() {
            if self.remaining_mask == 0 {
                self.refill_mask();
            }
            let used = BLOCK_LENGTH - self.remaining_mask;
            let take = (data.len() - offset).min(self.remaining_mask);
            crate::bytes::xor_into(
                &mut data[offset..offset + take],
                &self.mask[used..used + take],
            );
            self.remaining_mask -= take;
            offset += take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::KeySize;

    #[test]
    fn first_keystream_block_uses_counter_one() {
        let key = [0u8; 32];
        let aes = Aes::new(&key, KeySize::Aes256);
        let mut ctr = Ctr::new(aes, &[]);

        let mut data = vec![0u8; 16];
        ctr.apply(&mut data);

        let aes2 = Aes::new(&key, KeySize::Aes256);
        let mut expected = [0u8; 16];
        expected[0] = 1;
        aes2.encrypt_block(&mut expected);
        assert_eq!(data, expected);
    }

    #[test]
    fn apply_is_involutive() {
        let key = [7u8; 16];
        let mut enc = Ctr::new(Aes::new(&key, KeySize::Aes128), &[]);
        let mut dec = Ctr::new(Aes::new(&key, KeySize::Aes128), &[]);

        let plaintext = b"the quick brown fox jumps".to_vec();
        let mut buf = plaintext.clone();
        enc.apply(&mut buf);
        assert_ne!(buf, plaintext);
        dec.apply(&mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn crosses_block_boundary_in_multiple_calls() {
        let key = [3u8; 16];
        let mut a = Ctr::new(Aes::new(&key, KeySize::Aes128), &[]);
        let mut b = Ctr::new(Aes::new(&key, KeySize::Aes128), &[]);

        let data: Vec<u8> = (0..40u8).collect();

        let mut whole = data.clone();
        a.apply(&mut whole);

        let mut split = data.clone();
        b.apply(&mut split[..5]);
        b.apply(&mut split[5..23]);
        b.apply(&mut split[23..]);

        assert_eq!(whole, split);
    }
}

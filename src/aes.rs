//! AES-128/192/256 key expansion and single-block encryption (FIPS-197).
//!
//! Only the forward cipher is implemented: CTR mode (see [`crate::ctr`]) only
//! ever calls `encrypt_block` to produce keystream, for both encryption and
//! decryption, so there is no need for `InvSubBytes`/`InvMixColumns`.

use crate::gf2;
use std::sync::OnceLock;

const GF_DIVISOR: u16 = 0x011B;

fn affine_transform(inv: u8) -> u8 {
    inv ^ inv.rotate_left(1) ^ inv.rotate_left(2) ^ inv.rotate_left(3) ^ inv.rotate_left(4)
}

fn sub_byte_slow(x: u8) -> u8 {
    let inv = gf2::invmodmul(x as u16, GF_DIVISOR);
    affine_transform(inv) ^ 0x63
}

fn sbox() -> &'static [u8; 256] {
    static SBOX: OnceLock<[u8; 256]> = OnceLock::new();
    SBOX.get_or_init(|| {
        let mut table = [0u8; 256];
        for (x, slot) in table.iter_mut().enumerate() {
            *slot = sub_byte_slow(x as u8);
        }
        table
    })
}

/// `byte_mul_0x03010102[y]` gives the four MixColumns coefficients
/// (0x02, 0x01, 0x01, 0x03) each multiplied by `y` in GF(2^8), packed into a
/// little-endian word. `mix_columns` recombines these via word rotations
/// instead of doing four GF multiplies per state byte.
fn byte_mul_0x03010102() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let coeffs = 0x03010102u32.to_le_bytes();
        let mut table = [0u32; 256];
        for (y, slot) in table.iter_mut().enumerate() {
            let y = y as u16;
            let bytes = [
                gf2::modmul(coeffs[0] as u16, y, GF_DIVISOR),
                gf2::modmul(coeffs[1] as u16, y, GF_DIVISOR),
                gf2::modmul(coeffs[2] as u16, y, GF_DIVISOR),
                gf2::modmul(coeffs[3] as u16, y, GF_DIVISOR),
            ];
            *slot = u32::from_le_bytes(bytes);
        }
        table
    })
}

fn word_mul_0x03010102(word: u32) -> u32 {
    let table = byte_mul_0x03010102();
    let y = word.to_le_bytes();
    table[y[0] as usize]
        ^ table[y[1] as usize].rotate_left(8)
        ^ table[y[2] as usize].rotate_left(16)
        ^ table[y[3] as usize].rotate_left(24)
}

fn sub_bytes(state: &mut [u8; 16]) {
    let table = sbox();
    for b in state.iter_mut() {
        *b = table[*b as usize];
    }
}

fn shift_rows(state: &mut [u8; 16]) {
    for r in 1..4usize {
        let old = [state[r], state[r + 4], state[r + 8], state[r + 12]];
        for c in 0..4usize {
            state[r + 4 * c] = old[(c + r) % 4];
        }
    }
}

fn mix_columns(state: &mut [u8; 16]) {
    for c in 0..4 {
        let word = u32::from_le_bytes(state[4 * c..4 * c + 4].try_into().unwrap());
        state[4 * c..4 * c + 4].copy_from_slice(&word_mul_0x03010102(word).to_le_bytes());
    }
}

fn add_round_key(state: &mut [u8; 16], round_key: &[u8]) {
    crate::bytes::xor_into(state, round_key);
}

fn rcon(i: u8) -> u8 {
    if i < 8 {
        1u8 << i
    } else if i % 2 == 1 {
        0x36
    } else {
        0x1B
    }
}

/// AES key length in bits: 128, 192, or 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    pub fn bytes(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    fn nk(self) -> usize {
        self.bytes() / 4
    }

    fn nr(self) -> usize {
        self.nk() + 6
    }
}

/// An expanded AES key, ready to encrypt 16-byte blocks.
pub struct Aes {
    key_size: KeySize,
    round_keys: Vec<[u8; 4]>,
}

impl Aes {
    /// Expands `key` (length must equal `key_size.bytes()`) into the full
    /// round-key schedule.
    pub fn new(key: &[u8], key_size: KeySize) -> Self {
        assert_eq!(key.len(), key_size.bytes());
        let nk = key_size.nk();
        let nr = key_size.nr();
        let total_words = 4 * (nr + 1);

        let mut words: Vec<[u8; 4]> = Vec::with_capacity(total_words);
        for chunk in key.chunks_exact(4) {
            words.push(chunk.try_into().unwrap());
        }

        for i in nk..total_words {
            let mut temp = words[i - 1];
            if i % nk == 0 {
                temp = [temp[1], temp[2], temp[3], temp[0]];
                let table = sbox();
                for b in temp.iter_mut() {
                    *b = table[*b as usize];
                }
                temp[0] ^= rcon((i / nk) as u8 - 1);
            } else if key_size == KeySize::Aes256 && i % nk == 4 {
                let table = sbox();
                for b in temp.iter_mut() {
                    *b = table[*b as usize];
                }
            }
            let prev = words[i - nk];
            words.push([
                prev[0] ^ temp[0],
                prev[1] ^ temp[1],
                prev[2] ^ temp[2],
                prev[3] ^ temp[3],
            ]);
        }

        Aes {
            key_size,
            round_keys: words,
        }
    }

    fn round_key_bytes(&self, round: usize) -> [u8; 16] {
        let mut out = [0u8; 16];
        for w in 0..4 {
            out[4 * w..4 * w + 4].copy_from_slice(&self.round_keys[4 * round + w]);
        }
        out
    }

    /// Encrypts a single 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; 16]) {
        let nr = self.key_size.nr();
        add_round_key(block, &self.round_key_bytes(0));

        for round in 1..nr {
            sub_bytes(block);
            shift_rows(block);
            mix_columns(block);
            add_round_key(block, &self.round_key_bytes(round));
        }

        sub_bytes(block);
        shift_rows(block);
        add_round_key(block, &self.round_key_bytes(nr));
    }
}

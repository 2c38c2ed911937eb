//! PCG-XSH-RR pseudo-random generator, used to mint a fresh salt for every
//! AES-encrypted entry. Not cryptographically hardened beyond what PCG
//! itself provides; designed for a single-process, non-reseeded threat
//! model rather than as a general-purpose CSPRNG.

const MUL: u64 = 0x5851F42D4C957F2D;
const INC: u64 = 0x14057B7EF767814F;

pub struct Pcg32 {
    state: u64,
}

impl Pcg32 {
    pub fn new(seed: u64) -> Self {
        let mut rng = Pcg32 {
            state: seed.wrapping_add(INC),
        };
        rng.next_u32();
        rng
    }

    /// Seeds from the current time and this generator's own address, so two
    /// `Zip`s created back to back still draw independent salts.
    pub fn from_entropy() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let mut seed = 0x24F9B7C98B4F68E1u64;
        if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
            seed ^= elapsed.as_nanos() as u64;
        }
        let mut rng = Pcg32::new(seed);
        seed ^= &rng as *const Pcg32 as u64;
        rng.state ^= seed;
        rng
    }

    pub fn next_u32(&mut self) -> u32 {
        let x = self.state;
        self.state = x.wrapping_mul(MUL).wrapping_add(INC);

        let count = (x >> 59) as u32;
        let xored = x ^ (x >> 18);
        ((xored >> 27) as u32).rotate_right(count)
    }

    /// Fills `out` with random bytes.
    pub fn fill_bytes(&mut self, out: &mut [u8]) {
        let mut chunks = out.chunks_exact_mut(4);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next_u32().to_le_bytes());
        }
        let remainder = chunks.into_remainder();
        if !remainder.is_empty() {
            let tail = self.next_u32().to_le_bytes();
            remainder.copy_from_slice(&tail[..remainder.len()]);
        }
    }
}

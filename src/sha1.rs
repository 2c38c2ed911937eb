//! SHA-1 (RFs 3174), used only as the hash underlying HMAC-SHA-1/PBKDF2 for
//! WinZip AE-2 key derivation.

const H0: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

pub const BLOCK_SIZE: usize = 64;
pub const OUTPUT_SIZE: usize = 20;

pub struct Sha1 {
    state: [u32; 5],
    buffer: Vec<u8>,
    total_len: u64,
}

impl Sha1 {
    pub fn new() -> Self {
        Sha1 {
            state: H0,
            buffer: Vec::with_capacity(BLOCK_SIZE),
            total_len: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;
        if !self.buffer.is_empty() {
            let need = BLOCK_SIZE - self.buffer.len();
            let take = need.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == BLOCK_SIZE {
                let block: [u8; BLOCK_SIZE] = self.buffer.as_slice().try_into().unwrap();
                process_block(&mut self.state, &block);
                self.buffer.clear();
            }
        }
        while data.len() >= BLOCK_SIZE {
            let block: [u8; BLOCK_SIZE] = data[..BLOCK_SIZE].try_into().unwrap();
            process_block(&mut self.state, &block);
            data = &data[BLOCK_SIZE..];
        }
        self.buffer.extend_from_slice(data);
    }

    pub fn finalize(mut self) -> [u8; OUTPUT_SIZE] {
        let bit_len = self.total_len * 8;
        self.buffer.push(0x80);
        while self.buffer.len() % BLOCK_SIZE != 56 {
            self.buffer.push(0);
        }
        self.buffer.extend_from_slice(&bit_len.to_be_bytes());

        let buffer = std::mem::take(&mut self.buffer);
        for block in buffer.chunks_exact(BLOCK_SIZE) {
            let block: [u8; BLOCK_SIZE] = block.try_into().unwrap();
            process_block(&mut self.state, &block);
        }

        let mut out = [0u8; OUTPUT_SIZE];
        for (i, word) in self.state.iter().enumerate() {
            out[4 * i..4 * i + 4].copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

fn process_block(state: &mut [u32; 5], block: &[u8; BLOCK_SIZE]) {
    let mut w = [0u32; 80];
    for i in 0..16 {
        w[i] = u32::from_be_bytes(block[4 * i..4 * i + 4].try_into().unwrap());
    }
    for i in 16..80 {
        w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *state;

    for (i, &wi) in w.iter().enumerate() {
        let (f, k) = match i {
            0..=19 => ((b & c) | ((!b) & d), 0x5A827999u32),
            20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
            40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
            _ => (b ^ c ^ d, 0xCA62C1D6),
        };
        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(wi);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);
}

/// One-shot SHA-1 over a buffer.
pub fn sha1(data: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut h = Sha1::new();
    h.update(data);
    h.finalize()
}

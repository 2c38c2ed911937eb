//! Little-endian byte packing and keystream XOR helpers.
//!
//! Every multi-byte field in the ZIP format is little-endian; these helpers
//! keep the packing logic in one place instead of scattering `to_le_bytes()`
//! calls with ad-hoc offsets across the writer.

/// Appends `v` to `out` as two little-endian bytes.
pub fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Appends `v` to `out` as four little-endian bytes.
pub fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Appends `v` to `out` as eight little-endian bytes.
pub fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// XORs `src` into `dst` in place, `dst.len()` bytes at most.
///
/// Used to apply a CTR keystream mask to plaintext/ciphertext. The only
/// contract is that `n = min(dst.len(), src.len())` bytes of `dst` are
/// XORed with the corresponding bytes of `src`; callers are responsible for
/// slicing both sides to the same length ahead of time.
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_little_endian() {
        let mut out = Vec::new();
        push_u16(&mut out, 0x0102);
        push_u32(&mut out, 0x05060708);
        push_u64(&mut out, 0x1122334455667788);
        assert_eq!(
            out,
            vec![0x02, 0x01, 0x08, 0x07, 0x06, 0x05, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
    }

    #[test]
    fn xor_into_masks_shorter_of_the_two() {
        let mut dst = vec![0xFFu8; 4];
        xor_into(&mut dst, &[0x01, 0x02]);
        assert_eq!(dst, vec![0xFE, 0xFD, 0xFF, 0xFF]);
    }
}

//! PBKDF2-HMAC-SHA-1 (RFC 2898), used to derive ZipAES key material.

use crate::hmac::HmacSha1;
use crate::sha1::OUTPUT_SIZE as HASH_LEN;

/// Derives `derived.len()` bytes of key material from `password` and `salt`
/// using `iterations` rounds of HMAC-SHA-1.
pub fn pbkdf2_hmac_sha1(password: &[u8], salt: &[u8], iterations: u32, derived: &mut [u8]) {
    let block_count = derived.len().div_ceil(HASH_LEN);

    for block_index in 1..=block_count as u32 {
        let mut salt_block = salt.to_vec();
        salt_block.extend_from_slice(&block_index.to_be_bytes());

        let mut mac = HmacSha1::new(password);
        mac.update(&salt_block);
        let mut u = mac.finalize();
        let mut block = u;

        for _ in 1..iterations {
            let mut mac = HmacSha1::new(password);
            mac.update(&u);
            u = mac.finalize();
            for (b, x) in block.iter_mut().zip(u.iter()) {
                *b ^= x;
            }
        }

        let start = (block_index as usize - 1) * HASH_LEN;
        let end = (start + HASH_LEN).min(derived.len());
        derived[start..end].copy_from_slice(&block[..end - start]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 6070 test vectors.
    #[test]
    fn rfc6070_case1() {
        let mut out = [0u8; 20];
        pbkdf2_hmac_sha1(b"password", b"salt", 1, &mut out);
        assert_eq!(hex(&out), "0c60c80f961f0e71f3a9b524af6012062fe037a6");
    }

    #[test]
    fn rfc6070_case2() {
        let mut out = [0u8; 20];
        pbkdf2_hmac_sha1(b"password", b"salt", 2, &mut out);
        assert_eq!(hex(&out), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    }

    #[test]
    fn rfc6070_case3() {
        let mut out = [0u8; 20];
        pbkdf2_hmac_sha1(b"password", b"salt", 4096, &mut out);
        assert_eq!(hex(&out), "4b007901b765489abead49d926f721d065a429c1");
    }

    #[test]
    fn rfc6070_case5_multi_block() {
        let mut out = [0u8; 25];
        pbkdf2_hmac_sha1(
            b"passwordPASSWORDpassword",
            b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
            4096,
            &mut out,
        );
        assert_eq!(
            hex(&out),
            "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038"
        );
    }
}

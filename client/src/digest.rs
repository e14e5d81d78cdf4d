//! SHA-256 for the login challenge.
//!
//! The device validates `sha256(token + password)` as lowercase hex, so any
//! divergence here breaks every login. [`sha256_hex`] uses the `sha2` crate
//! when the `native-digest` feature is enabled (the default). Builds without
//! it, or a panic inside the native path, fall back to [`sha256_portable`], a
//! self-contained FIPS 180-4 implementation. The fallback is logged once and
//! never reported to the caller.

use std::sync::Once;

use tracing::warn;

/// Round constants: first 32 bits of the fractional parts of the cube roots
/// of the first 64 primes.
const K: [u32; 64] = [
    0x428a_2f98, 0x7137_4491, 0xb5c0_fbcf, 0xe9b5_dba5, 0x3956_c25b, 0x59f1_11f1, 0x923f_82a4,
    0xab1c_5ed5, 0xd807_aa98, 0x1283_5b01, 0x2431_85be, 0x550c_7dc3, 0x72be_5d74, 0x80de_b1fe,
    0x9bdc_06a7, 0xc19b_f174, 0xe49b_69c1, 0xefbe_4786, 0x0fc1_9dc6, 0x240c_a1cc, 0x2de9_2c6f,
    0x4a74_84aa, 0x5cb0_a9dc, 0x76f9_88da, 0x983e_5152, 0xa831_c66d, 0xb003_27c8, 0xbf59_7fc7,
    0xc6e0_0bf3, 0xd5a7_9147, 0x06ca_6351, 0x1429_2967, 0x27b7_0a85, 0x2e1b_2138, 0x4d2c_6dfc,
    0x5338_0d13, 0x650a_7354, 0x766a_0abb, 0x81c2_c92e, 0x9272_2c85, 0xa2bf_e8a1, 0xa81a_664b,
    0xc24b_8b70, 0xc76c_51a3, 0xd192_e819, 0xd699_0624, 0xf40e_3585, 0x106a_a070, 0x19a4_c116,
    0x1e37_6c08, 0x2748_774c, 0x34b0_bcb5, 0x391c_0cb3, 0x4ed8_aa4a, 0x5b9c_ca4f, 0x682e_6ff3,
    0x748f_82ee, 0x78a5_636f, 0x84c8_7814, 0x8cc7_0208, 0x90be_fffa, 0xa450_6ceb, 0xbef9_a3f7,
    0xc671_78f2,
];

/// Initial hash values: first 32 bits of the fractional parts of the square
/// roots of the first 8 primes.
const H0: [u32; 8] = [
    0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a, 0x510e_527f, 0x9b05_688c, 0x1f83_d9ab,
    0x5be0_cd19,
];

const BLOCK_LEN: usize = 64;

static FALLBACK_NOTICE: Once = Once::new();

/// SHA-256 of the UTF-8 bytes of `input`, as lowercase hex.
pub fn sha256_hex(input: &str) -> String {
    if let Some(digest) = native(input) {
        return digest;
    }
    FALLBACK_NOTICE.call_once(|| {
        warn!("native SHA-256 unavailable, using portable implementation");
    });
    sha256_portable(input)
}

#[cfg(feature = "native-digest")]
fn native(input: &str) -> Option<String> {
    std::panic::catch_unwind(|| {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    })
    .ok()
}

#[cfg(not(feature = "native-digest"))]
fn native(_input: &str) -> Option<String> {
    None
}

/// Pure-Rust SHA-256 of the UTF-8 bytes of `input`, as lowercase hex.
pub fn sha256_portable(input: &str) -> String {
    hex::encode(portable_digest(input.as_bytes()))
}

fn portable_digest(message: &[u8]) -> [u8; 32] {
    // Smallest whole number of blocks holding message + 0x80 + 8 length bytes.
    let block_count = (message.len() + 1 + 8).div_ceil(BLOCK_LEN);
    let mut padded = vec![0u8; block_count * BLOCK_LEN];
    padded[..message.len()].copy_from_slice(message);
    padded[message.len()] = 0x80;
    let bit_len = (message.len() as u64).wrapping_mul(8);
    let tail = padded.len() - 8;
    padded[tail..].copy_from_slice(&bit_len.to_be_bytes());

    let mut state = H0;
    for block in padded.chunks_exact(BLOCK_LEN) {
        compress(&mut state, block);
    }

    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

fn compress(state: &mut [u32; 8], block: &[u8]) {
    let mut schedule = [0u32; 64];
    for (slot, bytes) in schedule.iter_mut().zip(block.chunks_exact(4)) {
        *slot = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    for i in 16..64 {
        let w15 = schedule[i - 15];
        let w2 = schedule[i - 2];
        let s0 = w15.rotate_right(7) ^ w15.rotate_right(18) ^ (w15 >> 3);
        let s1 = w2.rotate_right(17) ^ w2.rotate_right(19) ^ (w2 >> 10);
        schedule[i] = schedule[i - 16]
            .wrapping_add(s0)
            .wrapping_add(schedule[i - 7])
            .wrapping_add(s1);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;
    for (k, w) in K.iter().zip(schedule.iter()) {
        let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
        let ch = (e & f) ^ (!e & g);
        let t1 = h
            .wrapping_add(s1)
            .wrapping_add(ch)
            .wrapping_add(*k)
            .wrapping_add(*w);
        let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
        let maj = (a & b) ^ (a & c) ^ (b & c);
        let t2 = s0.wrapping_add(maj);

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (word, add) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *word = word.wrapping_add(add);
    }
}

/// Lowercase hex encoding without pulling in the `hex` crate.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().fold(
            String::with_capacity(bytes.as_ref().len() * 2),
            |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{b:02x}");
                s
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn reference(input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes()))
    }

    #[test]
    fn test_portable_empty_string() {
        assert_eq!(
            sha256_portable(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_portable_abc() {
        assert_eq!(
            sha256_portable("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_portable_448_bit_message() {
        // 56 bytes: the length suffix no longer fits in the first block
        assert_eq!(
            sha256_portable("abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }

    #[test]
    fn test_portable_896_bit_message() {
        assert_eq!(
            sha256_portable(concat!(
                "abcdefghbcdefghicdefghijdefghijkefghijklfghijklmghijklmn",
                "hijklmnoijklmnopjklmnopqklmnopqrlmnopqrsmnopqrstnopqrstu",
            )),
            "cf5b16a778af8380036ce59e7b0492370b249b11e8f07a51afac45037afee9d1"
        );
    }

    #[test]
    fn test_portable_million_a() {
        let input = "a".repeat(1_000_000);
        assert_eq!(
            sha256_portable(&input),
            "cdc76e5c9914fb9281a1c7e284d73e67f1809a48a497200e046d39ccc7112cd0"
        );
    }

    #[test]
    fn test_portable_multibyte_input() {
        assert_eq!(
            sha256_portable("héllo wörld ✓"),
            "c2a59c71097b678dc5af2eb1f98ddc575b63948b0fa6740071a945673aaada4d"
        );
    }

    #[test]
    fn test_portable_matches_native_across_block_boundaries() {
        // Covers every padding layout: 55/56 and 63/64/65 byte edges included
        for len in 0..=300 {
            let input: String = (0..len)
                .map(|i| char::from(b'!' + u8::try_from(i % 90).unwrap()))
                .collect();
            assert_eq!(sha256_portable(&input), reference(&input), "length {len}");
        }
    }

    #[test]
    fn test_login_challenge_digest() {
        assert_eq!(
            sha256_hex("abcmypassword"),
            "b69f34bde862c67192607c92ee0512c9bb85a5f8ee9fc294fe1b0f382c192a56"
        );
        assert_eq!(
            sha256_hex("abcmypassword"),
            sha256_portable("abcmypassword")
        );
    }
}

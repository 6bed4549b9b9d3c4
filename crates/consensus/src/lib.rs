//! Consensus constants, parameters, and stake fork schedule.

pub mod forks;
pub mod params;

pub use forks::{modifier_lookahead, uses_offset_correction, uses_target_reduction, KernelRules};
pub use params::{consensus_params, hash256_from_hex, ConsensusParams, Network};

pub type Hash256 = [u8; 32];

pub const NULL_HASH256: Hash256 = [0u8; 32];

pub fn is_null_hash256(hash: &Hash256) -> bool {
    hash.iter().all(|byte| *byte == 0)
}

/// Display-order (big-endian) hex rendering, the inverse of
/// [`hash256_from_hex`].
pub fn hash256_to_hex(hash: &Hash256) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash.iter().rev() {
        out.push(hex_digit(byte >> 4));
        out.push(hex_digit(byte & 0x0f));
    }
    out
}

fn hex_digit(value: u8) -> char {
    match value {
        0..=9 => (b'0' + value) as char,
        _ => (b'a' + value - 10) as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let hex = "00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
        let hash = hash256_from_hex(hex).expect("hash");
        assert_eq!(hash256_to_hex(&hash), hex);
    }

    #[test]
    fn null_detection() {
        assert!(is_null_hash256(&NULL_HASH256));
        let mut hash = NULL_HASH256;
        hash[7] = 1;
        assert!(!is_null_hash256(&hash));
    }
}

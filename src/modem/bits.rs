// Byte <-> bit conversion, MSB first

use crate::error::{Error, Result};

/// One bit per element, each 0 or 1.
pub type BitStream = Vec<u8>;

/// Convert byte to bit array (MSB first)
pub fn byte_to_bits(byte: u8) -> [u8; 8] {
    let mut bits = [0u8; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1;
    }
    bits
}

/// Convert bytes to bit vector
pub fn bytes_to_bits(bytes: &[u8]) -> BitStream {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        bits.extend_from_slice(&byte_to_bits(byte));
    }
    bits
}

/// Convert bit vector to bytes.
///
/// A trailing group shorter than 8 bits is rejected with
/// [`Error::PartialByte`] rather than padded.
pub fn bits_to_bytes(bits: &[u8]) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(Error::PartialByte { len: bits.len() });
    }

    Ok(bits
        .chunks_exact(8)
        .map(|group| {
            group
                .iter()
                .fold(0u8, |byte, &bit| (byte << 1) | (bit & 1))
        })
        .collect())
}

/// Number of differing bits between two byte buffers.
///
/// Bytes past the end of the shorter buffer count as fully wrong.
pub fn count_bit_errors(original: &[u8], received: &[u8]) -> u64 {
    let common: u64 = original
        .iter()
        .zip(received)
        .map(|(a, b)| (a ^ b).count_ones() as u64)
        .sum();
    let missing = original.len().abs_diff(received.len()) as u64 * 8;
    common + missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_to_bits_msb_first() {
        assert_eq!(byte_to_bits(0b1011_0010), [1, 0, 1, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_bytes_to_bits_preserves_order() {
        let bits = bytes_to_bits(&[0x80, 0x01]);
        assert_eq!(bits.len(), 16);
        assert_eq!(bits[0], 1);
        assert!(bits[1..15].iter().all(|&b| b == 0));
        assert_eq!(bits[15], 1);
    }

    #[test]
    fn test_bits_to_bytes() {
        let bits = [1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1];
        assert_eq!(bits_to_bytes(&bits).unwrap(), vec![0b1011_0010, 0xFF]);
    }

    #[test]
    fn test_partial_byte_rejected() {
        let bits = [1, 0, 1];
        match bits_to_bytes(&bits) {
            Err(Error::PartialByte { len }) => assert_eq!(len, 3),
            other => panic!("expected PartialByte, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_round_trip() {
        assert!(bytes_to_bits(&[]).is_empty());
        assert!(bits_to_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_count_bit_errors() {
        assert_eq!(count_bit_errors(&[0xFF, 0x00], &[0xFF, 0x00]), 0);
        assert_eq!(count_bit_errors(&[0xFF, 0x00], &[0xFE, 0x01]), 2);
        assert_eq!(count_bit_errors(&[0xAA, 0xAA], &[0xAA]), 8);
    }
}

//! Sequence-keyed checksum byte carried by legacy move packets.
//!
//! The server recomputes the byte over the same block and drops packets that
//! do not match, which rejects moves replayed under a different sequence.

const KEY_TABLE_LEN: usize = 1024;
const MAX_CHECKSUM_BLOCK: usize = 60;

const CRC_INIT: u16 = 0xFFFF;
const CRC_POLY: u16 = 0x1021;

static KEY_TABLE: [u8; KEY_TABLE_LEN] = build_key_table();

const fn build_key_table() -> [u8; KEY_TABLE_LEN] {
    let mut table = [0u8; KEY_TABLE_LEN];
    let mut state: u32 = 0x2545_F491;
    let mut i = 0;
    while i < KEY_TABLE_LEN {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        table[i] = (state >> 24) as u8;
        i += 1;
    }
    table
}

/// CRC-16/CCITT, initial value 0xFFFF, no final XOR.
pub fn crc_block(data: &[u8]) -> u16 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Checksums at most the first 60 bytes of `block`, salted with four key
/// bytes picked by `sequence`.
pub fn block_sequence_crc_byte(block: &[u8], sequence: u32) -> u8 {
    let offset = sequence as usize % (KEY_TABLE_LEN - 4);
    let length = block.len().min(MAX_CHECKSUM_BLOCK);

    let mut chunk = [0u8; MAX_CHECKSUM_BLOCK + 4];
    chunk[..length].copy_from_slice(&block[..length]);
    chunk[length..length + 4].copy_from_slice(&KEY_TABLE[offset..offset + 4]);
    let chunk = &chunk[..length + 4];

    let crc = crc_block(chunk) as u32;
    let sum = chunk.iter().map(|&b| b as u32).sum::<u32>();
    ((crc ^ sum) & 0xFF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_value() {
        // CRC-16/CCITT-FALSE check value
        assert_eq!(crc_block(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_checksum_keyed_by_sequence() {
        let block = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let a = block_sequence_crc_byte(&block, 10);
        assert_eq!(a, block_sequence_crc_byte(&block, 10));

        let differs = (11..20).any(|seq| block_sequence_crc_byte(&block, seq) != a);
        assert!(differs);
    }

    #[test]
    fn test_checksum_ignores_bytes_past_limit() {
        let mut long = vec![7u8; 80];
        let a = block_sequence_crc_byte(&long, 3);
        long[70] = 0;
        assert_eq!(a, block_sequence_crc_byte(&long, 3));
    }
}

//! Key to hash slot mapping.
//!
//! Redis Cluster assigns every key to one of 16384 slots by CRC-16. Keys may
//! carry a hash tag, `{...}`, in which case only the tagged substring is
//! hashed so related keys land on the same slot.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16/XMODEM, the checksum Redis Cluster uses for key hashing.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculates the hash slot for a key.
///
/// # Example
///
/// ```
/// use shardis::cluster::slot::key_slot;
///
/// assert_eq!(key_slot("123456789"), 12739);
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// ```
pub fn key_slot(key: &str) -> u16 {
    let tagged = hash_input(key);
    CRC16.checksum(tagged.as_bytes()) % SLOT_COUNT
}

/// Selects the byte range to hash.
///
/// Only the first `{` and the first `}` after it matter; an empty tag (`{}`)
/// is not a tag at all and the whole key is hashed.
fn hash_input(key: &str) -> &str {
    if let Some(open) = key.find('{') {
        if let Some(len) = key[open + 1..].find('}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}

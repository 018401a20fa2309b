use super::*;

const TIMESTAMP_SIZE: usize = 8;
const SEQNUM_SIZE: usize = 4;
const SUFFIX_SIZE: usize = TIMESTAMP_SIZE + SEQNUM_SIZE;
const SIGN_BIT: u64 = 1 << 63;

/// Maps `(key, window_start, seq)` to a single store key and back.
///
/// Layout: raw key bytes, big-endian window start, big-endian sequence number.
/// The fixed-size suffix lets the raw key be recovered without a length prefix.
/// The window start has its sign bit flipped so byte order matches numeric
/// order for negative timestamps too.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowKeySchema;

impl WindowKeySchema {
    pub fn to_store_key(key: &[u8], window_start: Timestamp, seq: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(key.len() + SUFFIX_SIZE);
        out.extend_from_slice(key);
        out.extend_from_slice(&((window_start as u64) ^ SIGN_BIT).to_be_bytes());
        out.extend_from_slice(&seq.to_be_bytes());
        out
    }

    pub fn extract_key(store_key: &[u8]) -> Result<&[u8]> {
        Self::check(store_key)?;
        Ok(&store_key[..store_key.len() - SUFFIX_SIZE])
    }

    pub fn extract_timestamp(store_key: &[u8]) -> Result<Timestamp> {
        Self::check(store_key)?;
        let start = store_key.len() - SUFFIX_SIZE;
        let mut buf = [0u8; TIMESTAMP_SIZE];
        buf.copy_from_slice(&store_key[start..start + TIMESTAMP_SIZE]);
        Ok((u64::from_be_bytes(buf) ^ SIGN_BIT) as Timestamp)
    }

    pub fn extract_seq(store_key: &[u8]) -> Result<u32> {
        Self::check(store_key)?;
        let start = store_key.len() - SEQNUM_SIZE;
        let mut buf = [0u8; SEQNUM_SIZE];
        buf.copy_from_slice(&store_key[start..]);
        Ok(u32::from_be_bytes(buf))
    }

    /// Smallest store key for `key` with a window start of `from`.
    pub fn lower_range(key: &[u8], from: Timestamp) -> Vec<u8> {
        Self::to_store_key(key, from, 0)
    }

    /// Largest store key for `key` with a window start of `to`.
    pub fn upper_range(key: &[u8], to: Timestamp) -> Vec<u8> {
        Self::to_store_key(key, to, u32::MAX)
    }

    fn check(store_key: &[u8]) -> Result<()> {
        if store_key.len() < SUFFIX_SIZE {
            return Err(anyhow!(
                "window store key too short: {} bytes",
                store_key.len()
            ));
        }
        Ok(())
    }
}

use super::*;
use crate::types::Timestamp;

const TIMESTAMP_LEN: usize = 8;

/// A stored value together with the timestamp of the record that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAndTimestamp<V> {
    pub value: V,
    pub timestamp: Timestamp,
}

impl<V> ValueAndTimestamp<V> {
    pub fn new(value: V, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

/// Wraps a value codec; the encoding is an 8-byte big-endian timestamp
/// followed by the inner value bytes.
pub struct ValueAndTimestampSerDes<V> {
    inner: Arc<dyn SerDes<V>>,
}

impl<V> ValueAndTimestampSerDes<V> {
    pub fn new(inner: Arc<dyn SerDes<V>>) -> Self {
        Self { inner }
    }
}

impl<V> SerDes<ValueAndTimestamp<V>> for ValueAndTimestampSerDes<V> {
    fn serialize(&self, data: &ValueAndTimestamp<V>) -> Result<Vec<u8>> {
        let value = self.inner.serialize(&data.value)?;
        Ok(join_timestamped(data.timestamp, &value))
    }

    fn deserialize(&self, data: &[u8]) -> Result<ValueAndTimestamp<V>> {
        let (timestamp, rest) = split_timestamped(data)?;
        Ok(ValueAndTimestamp::new(self.inner.deserialize(rest)?, timestamp))
    }
}

/// Split raw timestamped bytes into the timestamp and the encoded value.
pub fn split_timestamped(data: &[u8]) -> Result<(Timestamp, &[u8])> {
    if data.len() < TIMESTAMP_LEN {
        return Err(anyhow!(
            "timestamped value needs at least {TIMESTAMP_LEN} bytes, got {}",
            data.len()
        ));
    }
    let (ts, rest) = data.split_at(TIMESTAMP_LEN);
    let mut buf = [0u8; TIMESTAMP_LEN];
    buf.copy_from_slice(ts);
    Ok((Timestamp::from_be_bytes(buf), rest))
}

/// Prefix already-encoded value bytes with a timestamp.
pub fn join_timestamped(timestamp: Timestamp, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TIMESTAMP_LEN + value.len());
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(value);
    out
}

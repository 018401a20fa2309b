use super::*;

/// UTF-8 string codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerDes;

impl SerDes<String> for StringSerDes {
    fn serialize(&self, data: &String) -> Result<Vec<u8>> {
        Ok(data.as_bytes().to_vec())
    }

    fn deserialize(&self, data: &[u8]) -> Result<String> {
        String::from_utf8(data.to_vec()).map_err(|e| anyhow!("invalid UTF-8 payload: {e}"))
    }
}

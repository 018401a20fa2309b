use super::*;

/// Codec for any serde type, using bincode's compact encoding.
pub struct BincodeSerDes<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> BincodeSerDes<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for BincodeSerDes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeSerDes<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> SerDes<T> for BincodeSerDes<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, data: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(data)?)
    }

    fn deserialize(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }
}

use crate::{
    error::{ErrorOrigin, InternalError},
    serialize::{SerializeError, deserialize_bounded, serialize},
};
use serde::{Serialize, de::DeserializeOwned};

///
/// SpillStream
///
/// In-memory, append-only list of encoded spill records. Records are bounded
/// in size on both the write and the read side.
///

#[derive(Debug)]
pub(crate) struct SpillStream {
    records: Vec<Vec<u8>>,
    max_record_bytes: usize,
}

impl SpillStream {
    pub(crate) const fn new(max_record_bytes: usize) -> Self {
        Self {
            records: Vec::new(),
            max_record_bytes,
        }
    }

    pub(crate) fn append<T: Serialize>(&mut self, record: &T) -> Result<(), InternalError> {
        let encoded = serialize(record).map_err(spill_error)?;
        if encoded.len() > self.max_record_bytes {
            return Err(spill_error(SerializeError::PayloadTooLarge {
                len: encoded.len(),
                limit: self.max_record_bytes,
            }));
        }

        self.records.try_reserve(1).map_err(|_| {
            InternalError::out_of_memory(
                ErrorOrigin::Spill,
                "spill stream",
                u64::try_from(encoded.len()).unwrap_or(u64::MAX),
            )
        })?;
        self.records.push(encoded);

        Ok(())
    }

    pub(crate) const fn len(&self) -> usize {
        self.records.len()
    }

    /// Decode every record in append order.
    pub(crate) fn decode_all<T: DeserializeOwned>(self) -> Result<Vec<T>, InternalError> {
        let limit = self.max_record_bytes;

        self.records
            .into_iter()
            .map(|bytes| deserialize_bounded(&bytes, limit).map_err(spill_error))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn push_raw(&mut self, bytes: Vec<u8>) {
        self.records.push(bytes);
    }
}

fn spill_error(err: SerializeError) -> InternalError {
    InternalError::spill_serialization(err.to_string())
}

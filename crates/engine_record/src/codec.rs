//! MessagePack codec helpers.
//!
//! A record log is a plain concatenation of MessagePack-encoded [`Record`]s
//! with no framing; each value is self-delimiting.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::record::Record;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`RecordError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RecordError> {
    rmp_serde::to_vec(value).map_err(RecordError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`RecordError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, RecordError> {
    rmp_serde::from_slice(bytes).map_err(RecordError::Decode)
}

/// Read every record from a log written by
/// [`MsgpackRecorder`](crate::MsgpackRecorder).
///
/// # Errors
///
/// [`RecordError::Io`] if the source fails, [`RecordError::Decode`] on a
/// truncated or corrupt record.
pub fn read_records(mut source: impl Read) -> Result<Vec<Record>, RecordError> {
    let mut buf = Vec::new();
    source.read_to_end(&mut buf)?;

    let mut rest: &[u8] = &buf;
    let mut records = Vec::new();
    while !rest.is_empty() {
        records.push(rmp_serde::from_read(&mut rest)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<Record, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(RecordError::Decode(_))));
    }

    #[test]
    fn test_truncated_log_is_an_error() {
        let record = Record {
            time: engine_event::SimTime::ZERO,
            entity: engine_component::Entity::from_parts(0, 0),
            component: "Position".into(),
            attribute: "x".into(),
            value: serde_json::json!(1.5),
        };
        let mut bytes = encode(&record).unwrap();
        bytes.pop();
        assert!(read_records(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_empty_log() {
        assert!(read_records(&[][..]).unwrap().is_empty());
    }
}

//! # engine_record
//!
//! Persistence of per-cycle snapshots.
//!
//! After every cycle the coordinator hands the store's attribute rows to a
//! [`Recorder`]. Two are provided:
//!
//! - [`MemoryRecorder`] keeps everything in a `Vec`, for tests and analysis.
//! - [`MsgpackRecorder`] appends MessagePack records to any writer.
//!
//! [`read_records`] reads a MessagePack log back.

pub mod codec;
pub mod error;
pub mod record;

pub use codec::{decode, encode, read_records};
pub use error::RecordError;
pub use record::{MemoryRecorder, MsgpackRecorder, Record, Recorder};

//! Codec module - TLV serialization for application payloads.
//!
//! A TLV message is a fixed 9-byte magic preamble followed by any number of
//! records:
//!
//! ```text
//! ┌───────────────┬──────┬────────┬──────────────┬─────┐
//! │ Magic         │ Type │ Length │ Value        │ ... │
//! │ 9 bytes       │ u8   │ u8     │ Length bytes │     │
//! └───────────────┴──────┴────────┴──────────────┴─────┘
//! ```
//!
//! - [`TlvWriter`] - appends records to a reusable buffer
//! - [`TlvReader`] - streaming parser dispatching records to typed handlers
//!
//! # Example
//!
//! ```
//! use btp_link::codec::{TlvHandler, TlvReader, TlvWriter};
//!
//! let mut writer = TlvWriter::new();
//! writer.write_u16(1, 1234);
//! writer.write_str(2, "camera", 12);
//!
//! let mut port = 0;
//! let mut name = String::new();
//! let mut reader = TlvReader::from_slice(writer.data());
//! reader.register_handler(1, TlvHandler::u16(|_, v| port = v));
//! reader.register_handler(2, TlvHandler::string(|_, v| name = v));
//! reader.read_all().unwrap();
//! drop(reader);
//!
//! assert_eq!(port, 1234);
//! assert_eq!(name, "camera");
//! ```

mod tlv_reader;
mod tlv_writer;

pub use tlv_reader::{FnSource, TlvHandler, TlvReader, STAGING_BUFFER_SIZE};
pub use tlv_writer::TlvWriter;

/// Preamble every TLV message starts with.
pub const TLV_MAGIC: [u8; 9] = *b"AMB82VBX\x01";

/// Size of the type + length prefix of one record.
pub const TYPE_LENGTH_SIZE: usize = 2;

/// Largest value a single record can carry.
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

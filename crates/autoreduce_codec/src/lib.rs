//! # autoreduce codec
//!
//! The self-describing binary document format used by autoreduce, and the
//! field path traverser that pulls values out of it.
//!
//! Documents are canonical CBOR:
//! - Maps are sorted by key (length-first, then bytewise comparison of encoded keys)
//! - Integers use shortest encoding
//! - No floats
//! - Strings must be UTF-8
//! - No indefinite-length items
//!
//! Equal values always encode to equal bytes, so the encoded form doubles as
//! stable hashing input.
//!
//! ## Usage
//!
//! ```
//! use autoreduce_codec::{from_cbor, read, to_canonical_cbor, FieldPath, Value};
//!
//! let doc = Value::object([
//!     ("Category", Value::from("A")),
//!     ("Price", Value::from(10)),
//! ]);
//! let bytes = to_canonical_cbor(&doc).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), doc);
//!
//! let path = FieldPath::parse("Price").unwrap();
//! assert_eq!(read(&doc, &path).unwrap().to_value(), Value::from(10));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod path;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use path::{read, ArrayStep, FieldPath, Sequence, Traversed};
pub use value::Value;

/// Maximum nesting depth accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 128;

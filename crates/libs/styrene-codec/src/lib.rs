//! # styrene-codec
//!
//! Schema-driven binary codec for links where every byte counts: LoRa
//! packets, UART frames, small flash records.
//!
//! Both ends share a schema out of band. Messages carry no tags, no header and
//! no version byte; field identity comes purely from schema order. Integers are
//! zigzag varints, floats fixed little-endian, strings and byte blobs
//! length-prefixed, nested messages inline.
//!
//! Framing is left to the caller. A length byte in front of each message is
//! the usual choice for radio links; [`Decoder::decode_prefix`] reports how
//! many bytes a message used when the caller has read past it. An optional
//! field with no presence marker counts as absent only when input ends right
//! where it would start, so a message that leaves out its trailing optional
//! fields must be framed exactly; extra bytes after it are read as those
//! fields.
//!
//! ## Example
//!
//! ```rust
//! use styrene_codec::{compile, decode, encode, RawField, RawSchema, Record, Value};
//!
//! let schema = compile(&RawSchema::new("Reading").message(
//!     "Reading",
//!     [
//!         RawField::new("station", "*U"),
//!         RawField::new("samples", "#z"),
//!         RawField::new("calibrated", "b"),
//!     ],
//! ))
//! .unwrap();
//!
//! let reading = Record::new()
//!     .with("station", "ridge-2")
//!     .with("samples", Value::list([12i64, -3, 40]))
//!     .with("calibrated", true);
//!
//! let bytes = encode(&schema, &reading).unwrap();
//! assert_eq!(bytes.len(), 13);
//! assert_eq!(decode(&schema, &bytes).unwrap(), reading);
//! ```
//!
//! ## Crate Family
//!
//! This crate is part of the [styrene-rs](https://github.com/styrene-lab/styrene-rs)
//! workspace. The `styrene-codec` binary in `codec-tool` drives it from the
//! shell.

mod cursor;
mod decoder;
mod encoder;
mod error;
mod record;

pub mod config;
pub mod registry;
pub mod schema;
pub mod varint;

pub use config::CodecConfig;
pub use cursor::Cursor;
pub use decoder::{decode, Decoder};
pub use encoder::{encode, Encoder};
pub use error::{DecodeError, EncodeError, SchemaError};
pub use record::{Record, TriBool, Value};
pub use registry::{FieldType, TypeRegistry, WireLayout};
pub use schema::{
    compile, FieldDescriptor, FieldKind, MessageNode, RawField, RawMessage, RawSchema, Schema,
    SchemaCompiler, SchemaId,
};

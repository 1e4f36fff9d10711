//! Bytes → record, the mirror of [`crate::encoder`].
//!
//! There are no tags to resynchronise on: a corrupted buffer either trips a
//! length or varint check or decodes to wrong values.

use crate::config::CodecConfig;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::record::{Record, Value};
use crate::registry::{ScalarCodec, WireLayout};
use crate::schema::{FieldDescriptor, FieldKind, Schema, SchemaId};

/// Decodes the root message of `schema` from `buf` with default limits.
///
/// Bytes after the message are ignored.
pub fn decode(schema: &Schema, buf: &[u8]) -> Result<Record, DecodeError> {
    Decoder::default().decode(schema, buf)
}

/// Holds the limits for decode calls; keeps no state between them.
#[derive(Debug, Clone)]
pub struct Decoder {
    max_depth: usize,
    max_repeated_elements: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl Decoder {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_repeated_elements: config.max_repeated_elements,
        }
    }

    pub fn decode(&self, schema: &Schema, buf: &[u8]) -> Result<Record, DecodeError> {
        self.decode_prefix(schema, buf).map(|(record, _)| record)
    }

    /// Decodes one message from the front of `buf`, returning it with the
    /// number of bytes it occupied.
    ///
    /// Optional fields without a presence marker are absent only when `buf`
    /// ends where they would begin. If the message was encoded with such
    /// fields left out, `buf` must end exactly at the message: any bytes after
    /// it are read as those fields and may fail to decode or yield wrong
    /// values.
    pub fn decode_prefix(
        &self,
        schema: &Schema,
        buf: &[u8],
    ) -> Result<(Record, usize), DecodeError> {
        let mut cursor = Cursor::new(buf);
        let pass = DecodePass { schema, decoder: self };
        match pass.message(schema.root(), &mut cursor, 0) {
            Ok(record) => {
                log::trace!(
                    "codec: decoded '{}' from {} of {} bytes",
                    schema.root_message().name(),
                    cursor.consumed(),
                    buf.len()
                );
                Ok((record, cursor.consumed()))
            }
            Err(err) => {
                log::debug!("codec: decode of '{}' failed: {err}", schema.root_message().name());
                Err(err)
            }
        }
    }
}

struct DecodePass<'a> {
    schema: &'a Schema,
    decoder: &'a Decoder,
}

impl DecodePass<'_> {
    fn message(
        &self,
        id: SchemaId,
        cursor: &mut Cursor<'_>,
        depth: usize,
    ) -> Result<Record, DecodeError> {
        if depth > self.decoder.max_depth {
            return Err(DecodeError::DepthExceeded { limit: self.decoder.max_depth });
        }
        let mut record = Record::new();
        for field in self.schema.message(id).fields() {
            if let Some(value) = self.field(field, cursor, depth)? {
                record.insert(field.name(), value);
            }
        }
        Ok(record)
    }

    fn field(
        &self,
        field: &FieldDescriptor,
        cursor: &mut Cursor<'_>,
        depth: usize,
    ) -> Result<Option<Value>, DecodeError> {
        if field.is_repeated() {
            let items = match field.kind() {
                FieldKind::Scalar(codec) if field.is_packed() => {
                    self.packed(field, codec, cursor)?
                }
                _ => self.sequence(field, cursor, depth)?,
            };
            return Ok(Some(Value::List(items)));
        }

        if let Some(codec) = field.optional_codec() {
            return (codec.decode)(cursor);
        }

        // An omitted optional field can only sit at the very end of the input.
        if !field.is_required() && cursor.is_empty() {
            return Ok(None);
        }

        let value = match field.kind() {
            FieldKind::Scalar(codec) => (codec.decode)(cursor)?,
            FieldKind::Message(target) => {
                Value::Message(self.message(target, cursor, depth + 1)?)
            }
        };
        Ok(Some(value))
    }

    fn sequence(
        &self,
        field: &FieldDescriptor,
        cursor: &mut Cursor<'_>,
        depth: usize,
    ) -> Result<Vec<Value>, DecodeError> {
        let count = cursor.read_unsigned()?;
        let layout = field.field_type().layout;
        let framed = matches!(layout, WireLayout::Fixed(_) | WireLayout::Varint);
        let min_width = match field.kind() {
            FieldKind::Message(_) => 0,
            FieldKind::Scalar(_) if framed => 1 + layout.min_width(),
            FieldKind::Scalar(_) => layout.min_width(),
        };
        self.check_count(field, count, min_width, cursor.remaining())?;

        // Bounded by the check above.
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let item = match field.kind() {
                FieldKind::Message(target) => {
                    Value::Message(self.message(target, cursor, depth + 1)?)
                }
                FieldKind::Scalar(codec) if framed => {
                    let declared = cursor.read_unsigned()?;
                    let mut element = cursor.split(declared)?;
                    let value = (codec.decode)(&mut element)?;
                    if !element.is_empty() {
                        return Err(DecodeError::LengthMismatch {
                            field: field.name().to_owned(),
                            declared,
                            consumed: element.consumed(),
                        });
                    }
                    value
                }
                FieldKind::Scalar(codec) => (codec.decode)(cursor)?,
            };
            items.push(item);
        }
        Ok(items)
    }

    fn packed(
        &self,
        field: &FieldDescriptor,
        codec: ScalarCodec,
        cursor: &mut Cursor<'_>,
    ) -> Result<Vec<Value>, DecodeError> {
        let declared = cursor.read_unsigned()?;
        let mut group = cursor.split(declared)?;
        let width = field.field_type().layout.min_width().max(1);
        if let WireLayout::Fixed(size) = field.field_type().layout {
            let whole = declared - declared % size as u64;
            if whole != declared {
                return Err(DecodeError::LengthMismatch {
                    field: field.name().to_owned(),
                    declared,
                    consumed: whole as usize,
                });
            }
        }

        let mut items = Vec::with_capacity(group.remaining() / width);
        while !group.is_empty() {
            let left = group.remaining();
            items.push((codec.decode)(&mut group)?);
            if group.remaining() == left {
                return Err(DecodeError::LengthMismatch {
                    field: field.name().to_owned(),
                    declared,
                    consumed: group.consumed(),
                });
            }
        }
        Ok(items)
    }

    fn check_count(
        &self,
        field: &FieldDescriptor,
        count: u64,
        min_width: usize,
        remaining: usize,
    ) -> Result<(), DecodeError> {
        if min_width == 0 {
            if count > self.decoder.max_repeated_elements as u64 {
                return Err(DecodeError::TooManyElements {
                    field: field.name().to_owned(),
                    count,
                    limit: self.decoder.max_repeated_elements,
                });
            }
            return Ok(());
        }
        let needed = count.saturating_mul(min_width as u64);
        if needed > remaining as u64 {
            return Err(DecodeError::TruncatedInput { needed, remaining });
        }
        Ok(())
    }
}

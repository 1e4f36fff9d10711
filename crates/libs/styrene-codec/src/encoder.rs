//! Record → bytes.
//!
//! Fields are written in schema order with no tags:
//!
//! ```text
//! scalar            value bytes per the type table
//! optional bool     one byte 0/1/2
//! repeated          [count][elem]...        fixed/varint elems carry [len] first
//! packed repeated   [total len][elem][elem]...
//! message           nested fields inline
//! ```

use crate::config::CodecConfig;
use crate::error::EncodeError;
use crate::record::{Record, Value};
use crate::registry::{Mismatch, ScalarCodec, WireLayout};
use crate::schema::{FieldDescriptor, FieldKind, Schema, SchemaId};
use crate::varint;

/// Encodes `record` against the root message of `schema` with default limits.
pub fn encode(schema: &Schema, record: &Record) -> Result<Vec<u8>, EncodeError> {
    Encoder::default().encode(schema, record)
}

/// Holds the limits for encode calls; keeps no state between them.
#[derive(Debug, Clone)]
pub struct Encoder {
    max_depth: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl Encoder {
    pub fn new(config: &CodecConfig) -> Self {
        Self { max_depth: config.max_depth }
    }

    pub fn encode(&self, schema: &Schema, record: &Record) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_into(schema, record, &mut out)?;
        Ok(out)
    }

    /// Appends the encoding of `record` to `out` and returns the number of bytes written.
    ///
    /// On error `out` is restored to its original length.
    pub fn encode_into(
        &self,
        schema: &Schema,
        record: &Record,
        out: &mut Vec<u8>,
    ) -> Result<usize, EncodeError> {
        let start = out.len();
        let result = EncodePass {
            schema,
            max_depth: self.max_depth,
            out: &mut *out,
            scratch: Vec::new(),
            omitted: None,
        }
        .message(schema.root(), record, 0);
        match result {
            Ok(()) => {
                let written = out.len() - start;
                log::trace!(
                    "codec: encoded '{}' into {written} bytes",
                    schema.root_message().name()
                );
                Ok(written)
            }
            Err(err) => {
                out.truncate(start);
                log::debug!("codec: encode of '{}' failed: {err}", schema.root_message().name());
                Err(err)
            }
        }
    }
}

struct EncodePass<'s, 'o> {
    schema: &'s Schema,
    max_depth: usize,
    out: &'o mut Vec<u8>,
    scratch: Vec<u8>,
    /// First optional field left out; nothing may be written after it.
    omitted: Option<String>,
}

impl EncodePass<'_, '_> {
    fn message(&mut self, id: SchemaId, record: &Record, depth: usize) -> Result<(), EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::DepthExceeded { limit: self.max_depth });
        }
        let schema = self.schema;
        for field in schema.message(id).fields() {
            // Only an omission from an earlier field blocks this one; one made
            // inside this field's own nested message is checked in there.
            let pending = self.omitted.is_some();
            let before = self.out.len();
            self.field(field, record.get(field.name()), depth)?;
            if pending && self.out.len() > before {
                if let Some(omitted) = self.omitted.take() {
                    return Err(EncodeError::OmissionNotTrailing { field: omitted });
                }
            }
        }
        Ok(())
    }

    fn field(
        &mut self,
        field: &FieldDescriptor,
        value: Option<&Value>,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if field.is_repeated() {
            let items = match value {
                None => &[][..],
                Some(Value::List(items)) => items.as_slice(),
                Some(other) => return Err(mismatch(field, "list", other)),
            };
            return match field.kind() {
                FieldKind::Scalar(codec) if field.is_packed() => self.packed(field, codec, items),
                _ => self.sequence(field, items, depth),
            };
        }

        if let Some(codec) = field.optional_codec() {
            return (codec.encode)(value, self.out).map_err(|Mismatch| EncodeError::TypeMismatch {
                field: field.name().to_owned(),
                expected: field.field_type().name,
                found: value.map_or("missing", Value::kind),
            });
        }

        let Some(value) = value else {
            if field.is_required() {
                return Err(EncodeError::RequiredFieldMissing { field: field.name().to_owned() });
            }
            if self.omitted.is_none() {
                self.omitted = Some(field.name().to_owned());
            }
            return Ok(());
        };

        match field.kind() {
            FieldKind::Scalar(codec) => self.scalar(field, codec, value),
            FieldKind::Message(target) => self.nested(field, target, value, depth),
        }
    }

    fn scalar(
        &mut self,
        field: &FieldDescriptor,
        codec: ScalarCodec,
        value: &Value,
    ) -> Result<(), EncodeError> {
        (codec.encode)(value, self.out).map_err(|Mismatch| type_mismatch(field, value))
    }

    fn nested(
        &mut self,
        field: &FieldDescriptor,
        target: SchemaId,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let Value::Message(record) = value else {
            return Err(type_mismatch(field, value));
        };
        self.message(target, record, depth + 1)
    }

    fn sequence(
        &mut self,
        field: &FieldDescriptor,
        items: &[Value],
        depth: usize,
    ) -> Result<(), EncodeError> {
        varint::write_unsigned(items.len() as u64, self.out);
        for item in items {
            match field.kind() {
                FieldKind::Message(target) => self.nested(field, target, item, depth)?,
                FieldKind::Scalar(codec) => match field.field_type().layout {
                    WireLayout::Fixed(_) | WireLayout::Varint => {
                        self.scratch.clear();
                        (codec.encode)(item, &mut self.scratch)
                            .map_err(|Mismatch| type_mismatch(field, item))?;
                        varint::write_unsigned(self.scratch.len() as u64, self.out);
                        self.out.extend_from_slice(&self.scratch);
                    }
                    _ => self.scalar(field, codec, item)?,
                },
            }
        }
        Ok(())
    }

    fn packed(
        &mut self,
        field: &FieldDescriptor,
        codec: ScalarCodec,
        items: &[Value],
    ) -> Result<(), EncodeError> {
        self.scratch.clear();
        for item in items {
            (codec.encode)(item, &mut self.scratch)
                .map_err(|Mismatch| type_mismatch(field, item))?;
        }
        varint::write_unsigned(self.scratch.len() as u64, self.out);
        self.out.extend_from_slice(&self.scratch);
        Ok(())
    }
}

fn type_mismatch(field: &FieldDescriptor, found: &Value) -> EncodeError {
    mismatch(field, field.field_type().name, found)
}

fn mismatch(field: &FieldDescriptor, expected: &'static str, found: &Value) -> EncodeError {
    EncodeError::TypeMismatch { field: field.name().to_owned(), expected, found: found.kind() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{compile, RawField, RawSchema};

    fn schema(fields: impl IntoIterator<Item = RawField>) -> Schema {
        compile(&RawSchema::new("M").message("M", fields)).expect("valid schema")
    }

    #[test]
    fn scalars_follow_schema_order() {
        let schema = schema([
            RawField::new("name", "*U"),
            RawField::new("level", "*z"),
            RawField::new("ok", "*b"),
            RawField::new("gap", "*x"),
        ]);
        let record = Record::new()
            .with("level", -2i64)
            .with("name", "ab")
            .with("ok", true)
            .with("gap", Value::Empty);
        assert_eq!(encode(&schema, &record), Ok(vec![0x02, b'a', b'b', 0x03, 0x01]));
    }

    #[test]
    fn optional_bool_absent_writes_two() {
        let schema = schema([RawField::new("flag", "b"), RawField::new("n", "*z")]);
        let record = Record::new().with("n", 1i64);
        assert_eq!(encode(&schema, &record), Ok(vec![0x02, 0x02]));

        let record = Record::new().with("flag", false).with("n", 1i64);
        assert_eq!(encode(&schema, &record), Ok(vec![0x00, 0x02]));
    }

    #[test]
    fn repeated_varints_carry_element_headers() {
        let schema = schema([RawField::new("xs", "+z")]);
        let record = Record::new().with("xs", Value::list([1i64, 64]));
        assert_eq!(encode(&schema, &record), Ok(vec![0x02, 0x01, 0x02, 0x02, 0x80, 0x01]));
    }

    #[test]
    fn repeated_strings_use_own_prefix() {
        let schema = schema([RawField::new("tags", "+U")]);
        let record = Record::new().with("tags", Value::list(["a", "bc"]));
        assert_eq!(encode(&schema, &record), Ok(vec![0x02, 0x01, b'a', 0x02, b'b', b'c']));
    }

    #[test]
    fn packed_varints_share_one_prefix() {
        let schema = schema([RawField::new("xs", "#z")]);
        let record = Record::new().with("xs", Value::list([1i64, 64]));
        assert_eq!(encode(&schema, &record), Ok(vec![0x03, 0x02, 0x80, 0x01]));
    }

    #[test]
    fn missing_repeated_is_empty() {
        let schema = schema([RawField::new("xs", "#f"), RawField::new("ys", "+U")]);
        assert_eq!(encode(&schema, &Record::new()), Ok(vec![0x00, 0x00]));
    }

    #[test]
    fn required_field_missing() {
        let schema = schema([RawField::new("id", "*z")]);
        assert_eq!(
            encode(&schema, &Record::new()),
            Err(EncodeError::RequiredFieldMissing { field: "id".into() })
        );
    }

    #[test]
    fn type_mismatch_names_field() {
        let schema = schema([RawField::new("id", "*z")]);
        let record = Record::new().with("id", "seven");
        assert_eq!(
            encode(&schema, &record),
            Err(EncodeError::TypeMismatch {
                field: "id".into(),
                expected: "varint",
                found: "string"
            })
        );

        let schema_list = self::schema([RawField::new("xs", "+z")]);
        let record = Record::new().with("xs", 1i64);
        assert!(matches!(
            encode(&schema_list, &record),
            Err(EncodeError::TypeMismatch { expected: "list", .. })
        ));
    }

    #[test]
    fn trailing_optional_may_be_omitted() {
        let schema = schema([RawField::new("id", "*z"), RawField::new("note", "U")]);
        let record = Record::new().with("id", 5i64);
        assert_eq!(encode(&schema, &record), Ok(vec![0x0a]));
    }

    #[test]
    fn omission_before_data_is_rejected() {
        let schema = schema([RawField::new("note", "U"), RawField::new("id", "*z")]);
        let record = Record::new().with("id", 5i64);
        assert_eq!(
            encode(&schema, &record),
            Err(EncodeError::OmissionNotTrailing { field: "note".into() })
        );
    }

    fn outer_inner(outer: RawField, tail: Option<RawField>) -> Schema {
        compile(
            &RawSchema::new("Outer")
                .message("Outer", std::iter::once(outer).chain(tail))
                .message("Inner", [RawField::new("a", "*z"), RawField::new("note", "U")]),
        )
        .expect("valid schema")
    }

    #[test]
    fn nested_message_may_end_with_omission() {
        let schema = outer_inner(RawField::nested("inner", "*m", "Inner"), None);
        let record = Record::new().with("inner", Record::new().with("a", 1i64));
        let wire = encode(&schema, &record).expect("trailing omission inside nested message");
        assert_eq!(wire, vec![0x02]);
        assert_eq!(crate::decoder::decode(&schema, &wire), Ok(record.clone()));

        let schema = outer_inner(
            RawField::nested("inner", "*m", "Inner"),
            Some(RawField::new("tail", "*z")),
        );
        let record = record.with("tail", 0i64);
        assert_eq!(
            encode(&schema, &record),
            Err(EncodeError::OmissionNotTrailing { field: "note".into() })
        );
    }

    #[test]
    fn last_repeated_message_may_end_with_omission() {
        let schema = outer_inner(RawField::nested("items", "+m", "Inner"), None);
        let item = Record::new().with("a", 1i64);
        let record = Record::new().with("items", Value::list([item.clone()]));
        let wire = encode(&schema, &record).expect("omission in last element");
        assert_eq!(wire, vec![0x01, 0x02]);
        assert_eq!(crate::decoder::decode(&schema, &wire), Ok(record));

        let record = Record::new().with("items", Value::list([item.clone(), item]));
        assert_eq!(
            encode(&schema, &record),
            Err(EncodeError::OmissionNotTrailing { field: "note".into() })
        );
    }

    #[test]
    fn optional_bool_accepts_only_bool() {
        let schema = schema([RawField::new("flag", "b")]);
        let record = Record::new().with("flag", 1i64);
        assert_eq!(
            encode(&schema, &record),
            Err(EncodeError::TypeMismatch {
                field: "flag".into(),
                expected: "bool",
                found: "varint"
            })
        );
    }

    #[test]
    fn depth_limit_applies_to_data() {
        let schema = compile(
            &RawSchema::new("Node").message("Node", [RawField::nested("child", "m", "Node")]),
        )
        .expect("valid schema");
        let mut record = Record::new();
        for _ in 0..4 {
            record = Record::new().with("child", record);
        }

        let shallow = Encoder::new(&CodecConfig::default().with_max_depth(3));
        assert_eq!(
            shallow.encode(&schema, &record),
            Err(EncodeError::DepthExceeded { limit: 3 })
        );

        let deep = Encoder::new(&CodecConfig::default().with_max_depth(4));
        assert!(deep.encode(&schema, &record).is_ok());
    }

    #[test]
    fn encode_into_leaves_buffer_untouched_on_error() {
        let schema = schema([RawField::new("a", "*U"), RawField::new("b", "*z")]);
        let mut out = vec![0xee];
        let record = Record::new().with("a", "partial");
        assert!(Encoder::default().encode_into(&schema, &record, &mut out).is_err());
        assert_eq!(out, vec![0xee]);

        let record = record.with("b", 0i64);
        assert_eq!(Encoder::default().encode_into(&schema, &record, &mut out), Ok(9));
        assert_eq!(out.len(), 10);
    }
}

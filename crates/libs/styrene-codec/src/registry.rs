//! Type tag table.
//!
//! Each field spec ends in a one-character type tag. The registry maps that
//! tag to a [`FieldType`]: its wire layout plus a pair of plain functions that
//! write and read one scalar value. The encoder and decoder only ever call
//! through these function pointers, so registering a new scalar type needs no
//! change to either of them.
//!
//! | Tag | Type    | Wire                                             |
//! |-----|---------|--------------------------------------------------|
//! | `U` | string  | unsigned varint byte length, UTF-8 bytes         |
//! | `a` | bytes   | unsigned varint byte length, raw bytes           |
//! | `b` | bool    | one byte `0`/`1`; optional: `0`/`1`/`2` (absent) |
//! | `f` | float32 | 4 bytes little-endian IEEE-754                   |
//! | `d` | float64 | 8 bytes little-endian IEEE-754                   |
//! | `z` | varint  | zigzag varint                                    |
//! | `x` | empty   | nothing                                          |
//! | `m` | message | nested fields inline                             |

use crate::cursor::Cursor;
use crate::error::{DecodeError, SchemaError};
use crate::record::{TriBool, Value};
use crate::varint;

/// Returned by an [`EncodeFn`] handed a value of the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch;

pub type EncodeFn = fn(&Value, &mut Vec<u8>) -> Result<(), Mismatch>;
pub type DecodeFn = fn(&mut Cursor<'_>) -> Result<Value, DecodeError>;
/// Writes an optional field that has its own absent marker; `None` is absent.
pub type OptionalEncodeFn = fn(Option<&Value>, &mut Vec<u8>) -> Result<(), Mismatch>;
/// Reads an optional field back; `Ok(None)` means the absent marker was read.
pub type OptionalDecodeFn = fn(&mut Cursor<'_>) -> Result<Option<Value>, DecodeError>;

/// How a type occupies the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLayout {
    /// Always exactly this many bytes.
    Fixed(usize),
    /// Zigzag varint.
    Varint,
    /// Unsigned varint byte length, then that many bytes.
    LengthPrefixed,
    /// Contributes no bytes.
    Zero,
    /// Fields of a nested schema, inline.
    Nested,
}

impl WireLayout {
    /// Whether elements of this layout may be packed into one length-prefixed block.
    pub fn is_packable(self) -> bool {
        matches!(self, Self::Fixed(width) if width > 0) || self == Self::Varint
    }

    /// Smallest number of bytes one value can occupy.
    pub fn min_width(self) -> usize {
        match self {
            Self::Fixed(width) => width,
            Self::Varint | Self::LengthPrefixed => 1,
            Self::Zero | Self::Nested => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScalarCodec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// Codec pair for optional fields that mark absence on the wire.
#[derive(Debug, Clone, Copy)]
pub struct OptionalCodec {
    pub encode: OptionalEncodeFn,
    pub decode: OptionalDecodeFn,
}

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct FieldType {
    pub tag: char,
    pub name: &'static str,
    pub layout: WireLayout,
    /// `None` only for the nested layout, which the encoder walks itself.
    pub codec: Option<ScalarCodec>,
    /// Replaces `codec` on optional, non-repeated fields when present.
    pub optional_codec: Option<OptionalCodec>,
}

impl FieldType {
    /// A scalar type with the same wire form whether required or optional.
    pub const fn scalar(
        tag: char,
        name: &'static str,
        layout: WireLayout,
        encode: EncodeFn,
        decode: DecodeFn,
    ) -> Self {
        Self {
            tag,
            name,
            layout,
            codec: Some(ScalarCodec { encode, decode }),
            optional_codec: None,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.layout == WireLayout::Nested
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.layout == other.layout
    }
}

pub const TAG_STRING: char = 'U';
pub const TAG_BYTES: char = 'a';
pub const TAG_BOOL: char = 'b';
pub const TAG_FLOAT32: char = 'f';
pub const TAG_FLOAT64: char = 'd';
pub const TAG_VARINT: char = 'z';
pub const TAG_EMPTY: char = 'x';
pub const TAG_MESSAGE: char = 'm';

const STANDARD_TYPES: [FieldType; 8] = [
    FieldType::scalar(
        TAG_STRING,
        "string",
        WireLayout::LengthPrefixed,
        encode_string,
        decode_string,
    ),
    FieldType::scalar(TAG_BYTES, "bytes", WireLayout::LengthPrefixed, encode_bytes, decode_bytes),
    FieldType {
        tag: TAG_BOOL,
        name: "bool",
        layout: WireLayout::Fixed(1),
        codec: Some(ScalarCodec { encode: encode_bool, decode: decode_bool }),
        optional_codec: Some(OptionalCodec { encode: encode_tri_bool, decode: decode_tri_bool }),
    },
    FieldType::scalar(TAG_FLOAT32, "float32", WireLayout::Fixed(4), encode_f32, decode_f32),
    FieldType::scalar(TAG_FLOAT64, "float64", WireLayout::Fixed(8), encode_f64, decode_f64),
    FieldType::scalar(TAG_VARINT, "varint", WireLayout::Varint, encode_int, decode_int),
    FieldType::scalar(TAG_EMPTY, "empty", WireLayout::Zero, encode_empty, decode_empty),
    FieldType {
        tag: TAG_MESSAGE,
        name: "message",
        layout: WireLayout::Nested,
        codec: None,
        optional_codec: None,
    },
];

/// Lookup table from type tag to [`FieldType`].
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<FieldType>,
}

impl TypeRegistry {
    /// The eight built-in types.
    pub fn standard() -> Self {
        Self { types: STANDARD_TYPES.to_vec() }
    }

    /// Adds a scalar type under a new tag.
    pub fn register(&mut self, field_type: FieldType) -> Result<(), SchemaError> {
        if field_type.is_nested() || field_type.codec.is_none() {
            return Err(SchemaError::ReservedLayout(field_type.tag));
        }
        if self.lookup(field_type.tag).is_some() {
            return Err(SchemaError::DuplicateTypeTag(field_type.tag));
        }
        self.types.push(field_type);
        Ok(())
    }

    pub fn lookup(&self, tag: char) -> Option<&FieldType> {
        self.types.iter().find(|field_type| field_type.tag == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldType> {
        self.types.iter()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn write_length_prefixed(bytes: &[u8], out: &mut Vec<u8>) {
    varint::write_unsigned(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn read_length_prefixed<'a>(cursor: &mut Cursor<'a>) -> Result<&'a [u8], DecodeError> {
    let len = cursor.read_unsigned()?;
    cursor.take(len)
}

fn encode_string(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::Str(text) = value else {
        return Err(Mismatch);
    };
    write_length_prefixed(text.as_bytes(), out);
    Ok(())
}

fn decode_string(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    let len = cursor.read_unsigned()?;
    let offset = cursor.offset();
    let bytes = cursor.take(len)?;
    let text = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })?;
    Ok(Value::Str(text.to_owned()))
}

fn encode_bytes(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::Bytes(bytes) = value else {
        return Err(Mismatch);
    };
    write_length_prefixed(bytes, out);
    Ok(())
}

fn decode_bytes(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    Ok(Value::Bytes(read_length_prefixed(cursor)?.to_vec()))
}

fn encode_bool(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::Bool(flag) = value else {
        return Err(Mismatch);
    };
    out.push(u8::from(*flag));
    Ok(())
}

fn decode_bool(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    let offset = cursor.offset();
    match cursor.read_u8()? {
        0 => Ok(Value::Bool(false)),
        1 => Ok(Value::Bool(true)),
        value => Err(DecodeError::InvalidBooleanState { value, offset }),
    }
}

fn encode_tri_bool(value: Option<&Value>, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let state = match value {
        None => TriBool::Absent,
        Some(Value::Bool(flag)) => TriBool::from(*flag),
        Some(_) => return Err(Mismatch),
    };
    out.push(state as u8);
    Ok(())
}

fn decode_tri_bool(cursor: &mut Cursor<'_>) -> Result<Option<Value>, DecodeError> {
    let offset = cursor.offset();
    let value = cursor.read_u8()?;
    let state =
        TriBool::from_byte(value).ok_or(DecodeError::InvalidBooleanState { value, offset })?;
    Ok(state.as_bool().map(Value::Bool))
}

fn encode_f32(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::F32(number) = value else {
        return Err(Mismatch);
    };
    out.extend_from_slice(&number.to_le_bytes());
    Ok(())
}

fn decode_f32(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    Ok(Value::F32(f32::from_le_bytes(cursor.take_array()?)))
}

fn encode_f64(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::F64(number) = value else {
        return Err(Mismatch);
    };
    out.extend_from_slice(&number.to_le_bytes());
    Ok(())
}

fn decode_f64(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    Ok(Value::F64(f64::from_le_bytes(cursor.take_array()?)))
}

fn encode_int(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
    let Value::Int(number) = value else {
        return Err(Mismatch);
    };
    varint::write_varint(*number, out);
    Ok(())
}

fn decode_int(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    Ok(Value::Int(cursor.read_varint()?))
}

fn encode_empty(value: &Value, _out: &mut Vec<u8>) -> Result<(), Mismatch> {
    match value {
        Value::Empty => Ok(()),
        _ => Err(Mismatch),
    }
}

fn decode_empty(_cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
    Ok(Value::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_with(tag: char, value: &Value) -> Vec<u8> {
        let registry = TypeRegistry::standard();
        let codec = registry.lookup(tag).and_then(|field_type| field_type.codec).expect("codec");
        let mut out = Vec::new();
        (codec.encode)(value, &mut out).expect("value matches type");
        out
    }

    #[test]
    fn standard_wire_forms() {
        assert_eq!(encode_with(TAG_STRING, &Value::from("hi")), vec![0x02, b'h', b'i']);
        assert_eq!(encode_with(TAG_BYTES, &Value::Bytes(vec![0xff])), vec![0x01, 0xff]);
        assert_eq!(encode_with(TAG_BOOL, &Value::Bool(true)), vec![0x01]);
        assert_eq!(encode_with(TAG_FLOAT32, &Value::F32(1.0)), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(encode_with(TAG_FLOAT64, &Value::F64(-2.5)), (-2.5f64).to_le_bytes().to_vec());
        assert_eq!(encode_with(TAG_VARINT, &Value::Int(-1)), vec![0x01]);
        assert!(encode_with(TAG_EMPTY, &Value::Empty).is_empty());
    }

    #[test]
    fn optional_bool_uses_third_state() {
        let registry = TypeRegistry::standard();
        let bool_type = registry.lookup(TAG_BOOL).expect("bool");
        let tri = bool_type.optional_codec.expect("tri-state codec");

        let mut out = Vec::new();
        (tri.encode)(None, &mut out).expect("encode");
        (tri.encode)(Some(&Value::Bool(false)), &mut out).expect("encode");
        assert_eq!(out, vec![0x02, 0x00]);
        assert_eq!((tri.encode)(Some(&Value::Int(1)), &mut out), Err(Mismatch));

        let mut cursor = Cursor::new(&[0x02, 0x01]);
        assert_eq!((tri.decode)(&mut cursor), Ok(None));
        assert_eq!((tri.decode)(&mut cursor), Ok(Some(Value::Bool(true))));

        let mut cursor = Cursor::new(&[0x03]);
        assert_eq!(
            (tri.decode)(&mut cursor),
            Err(DecodeError::InvalidBooleanState { value: 3, offset: 0 })
        );

        let plain = bool_type.codec.expect("plain codec");
        let mut cursor = Cursor::new(&[0x02]);
        assert!(matches!(
            (plain.decode)(&mut cursor),
            Err(DecodeError::InvalidBooleanState { value: 2, .. })
        ));
    }

    #[test]
    fn codecs_reject_wrong_kinds() {
        let registry = TypeRegistry::standard();
        for field_type in registry.iter().filter(|field_type| !field_type.is_nested()) {
            let codec = field_type.codec.expect("scalar codec");
            let wrong = if field_type.tag == TAG_STRING { Value::Int(1) } else { Value::from("x") };
            let result = (codec.encode)(&wrong, &mut Vec::new());
            assert_eq!(result, Err(Mismatch), "{}", field_type.name);
        }
    }

    #[test]
    fn decode_string_rejects_invalid_utf8() {
        let mut cursor = Cursor::new(&[0x02, 0xc3, 0x28]);
        assert_eq!(decode_string(&mut cursor), Err(DecodeError::InvalidUtf8 { offset: 1 }));
    }

    #[test]
    fn register_extends_table() {
        fn encode_u8(value: &Value, out: &mut Vec<u8>) -> Result<(), Mismatch> {
            let number = value.as_int().and_then(|n| u8::try_from(n).ok()).ok_or(Mismatch)?;
            out.push(number);
            Ok(())
        }
        fn decode_u8(cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
            Ok(Value::Int(i64::from(cursor.read_u8()?)))
        }

        let mut registry = TypeRegistry::standard();
        let byte_type = FieldType::scalar('B', "u8", WireLayout::Fixed(1), encode_u8, decode_u8);
        registry.register(byte_type).expect("new tag");
        assert!(registry.lookup('B').is_some());
        assert_eq!(registry.register(byte_type), Err(SchemaError::DuplicateTypeTag('B')));

        let nested = FieldType { tag: 'N', layout: WireLayout::Nested, codec: None, ..byte_type };
        assert_eq!(registry.register(nested), Err(SchemaError::ReservedLayout('N')));
    }

    #[test]
    fn packable_layouts() {
        assert!(WireLayout::Fixed(4).is_packable());
        assert!(WireLayout::Varint.is_packable());
        assert!(!WireLayout::Fixed(0).is_packable());
        assert!(!WireLayout::LengthPrefixed.is_packable());
        assert!(!WireLayout::Zero.is_packable());
        assert!(!WireLayout::Nested.is_packable());
    }
}

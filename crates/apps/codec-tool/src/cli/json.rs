//! Schema-guided conversion between JSON documents and codec records.
//!
//! Bytes travel as hex strings, `x` fields as `null`. An optional bool
//! reads `null` as absent and is always written back, `null` when absent.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Number, Value as Json};
use styrene_codec::registry::{
    TAG_BOOL, TAG_BYTES, TAG_EMPTY, TAG_FLOAT32, TAG_FLOAT64, TAG_STRING, TAG_VARINT,
};
use styrene_codec::{FieldDescriptor, FieldKind, Record, Schema, SchemaId, Value};

pub fn record_from_json(schema: &Schema, json: &Json) -> Result<Record> {
    message_from_json(schema, schema.root(), json)
}

pub fn record_to_json(schema: &Schema, record: &Record) -> Json {
    message_to_json(schema, schema.root(), record)
}

fn message_from_json(schema: &Schema, id: SchemaId, json: &Json) -> Result<Record> {
    let node = schema.message(id);
    let Json::Object(object) = json else {
        bail!("message '{}' must be a JSON object", node.name());
    };
    if let Some(unknown) = object.keys().find(|key| node.field(key).is_none()) {
        bail!("message '{}' has no field '{unknown}'", node.name());
    }

    let mut record = Record::new();
    for field in node.fields() {
        let Some(json) = object.get(field.name()) else {
            continue;
        };
        if json.is_null() && field.type_tag() != TAG_EMPTY {
            continue;
        }
        let value = if field.is_repeated() {
            let Json::Array(items) = json else {
                bail!("field '{}' must be a JSON array", field.name());
            };
            items
                .iter()
                .map(|item| element_from_json(schema, field, item))
                .collect::<Result<Value>>()?
        } else {
            element_from_json(schema, field, json)?
        };
        record.insert(field.name(), value);
    }
    Ok(record)
}

fn element_from_json(schema: &Schema, field: &FieldDescriptor, json: &Json) -> Result<Value> {
    let name = field.name();
    let value = match field.kind() {
        FieldKind::Message(target) => {
            let nested = message_from_json(schema, target, json)
                .with_context(|| format!("in field '{name}'"))?;
            return Ok(Value::Message(nested));
        }
        FieldKind::Scalar(_) => match field.type_tag() {
            TAG_STRING => json.as_str().map(Value::from),
            TAG_BYTES => json
                .as_str()
                .map(hex::decode)
                .transpose()
                .with_context(|| format!("field '{name}' is not hex"))?
                .map(Value::Bytes),
            TAG_BOOL => json.as_bool().map(Value::Bool),
            TAG_FLOAT32 => json.as_f64().map(|number| Value::F32(number as f32)),
            TAG_FLOAT64 => json.as_f64().map(Value::F64),
            TAG_VARINT => json.as_i64().map(Value::Int),
            TAG_EMPTY => json.is_null().then_some(Value::Empty),
            other => bail!("field '{name}' has type '{other}' with no JSON form"),
        },
    };
    value.with_context(|| format!("field '{name}' expects {}", field.field_type().name))
}

fn message_to_json(schema: &Schema, id: SchemaId, record: &Record) -> Json {
    let mut object = Map::new();
    for field in schema.message(id).fields() {
        match record.get(field.name()) {
            Some(value) => {
                object.insert(field.name().to_owned(), value_to_json(schema, field, value));
            }
            None if field.uses_optional_codec() => {
                object.insert(field.name().to_owned(), Json::Null);
            }
            None => {}
        }
    }
    Json::Object(object)
}

fn value_to_json(schema: &Schema, field: &FieldDescriptor, value: &Value) -> Json {
    match value {
        Value::Str(text) => Json::String(text.clone()),
        Value::Bytes(bytes) => Json::String(hex::encode(bytes)),
        Value::Bool(flag) => Json::Bool(*flag),
        Value::F32(number) => float(f64::from(*number)),
        Value::F64(number) => float(*number),
        Value::Int(number) => Json::from(*number),
        Value::Empty => Json::Null,
        Value::Message(nested) => match field.nested() {
            Some(target) => message_to_json(schema, target, nested),
            None => Json::Null,
        },
        Value::List(items) => {
            Json::Array(items.iter().map(|item| value_to_json(schema, field, item)).collect())
        }
    }
}

// NaN and infinities have no JSON number form.
fn float(number: f64) -> Json {
    Number::from_f64(number).map_or(Json::Null, Json::Number)
}

//! In-memory records exchanged with the encoder and decoder.

use std::collections::BTreeMap;

/// Three-state boolean carried by optional `bool` fields.
///
/// Wire values: `0` false, `1` true, `2` absent. In a [`Record`] the state
/// is a `Value::Bool` or a missing key; see [`Record::tri_bool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriBool {
    False = 0,
    True = 1,
    #[default]
    Absent = 2,
}

impl TriBool {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::False),
            1 => Some(Self::True),
            2 => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::False => Some(false),
            Self::True => Some(true),
            Self::Absent => None,
        }
    }
}

impl From<bool> for TriBool {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<Option<bool>> for TriBool {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Absent, Self::from)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
    F32(f32),
    F64(f64),
    Int(i64),
    Empty,
    Message(Record),
    List(Vec<Value>),
}

impl Value {
    /// Wraps any sequence of convertible items as a [`Value::List`].
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Short name of the variant, used in type mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Bool(_) => "bool",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
            Self::Int(_) => "varint",
            Self::Empty => "empty",
            Self::Message(_) => "message",
            Self::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Self::Message(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Message(value)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

/// Field values keyed by field name.
///
/// A record carries no schema of its own; the schema it is encoded against
/// decides which keys are read and in what order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Reads an optional boolean field; a missing key is [`TriBool::Absent`].
    pub fn tri_bool(&self, name: &str) -> TriBool {
        match self.fields.get(name) {
            Some(Value::Bool(value)) => TriBool::from(*value),
            _ => TriBool::Absent,
        }
    }

    /// Stores `state` as a `Value::Bool`, or removes the key when absent.
    pub fn set_tri_bool(&mut self, name: impl Into<String>, state: TriBool) {
        let name = name.into();
        match state.as_bool() {
            Some(flag) => {
                self.fields.insert(name, Value::Bool(flag));
            }
            None => {
                self.fields.remove(&name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect(),
        }
    }
}

//! Error types, one enum per codec phase.

/// Errors raised while compiling a raw schema definition.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("schema parse error: {0}")]
    Parse(String),

    #[error("field '{field}': empty field spec")]
    EmptySpec { field: String },

    #[error("field '{field}': unknown type tag '{tag}'")]
    UnknownTypeTag { field: String, tag: char },

    #[error("field '{field}': invalid modifiers in '{spec}' ({reason})")]
    InvalidModifiers {
        field: String,
        spec: String,
        reason: &'static str,
    },

    #[error("field '{field}': message field has no nested schema")]
    MissingNestedSchema { field: String },

    #[error("field '{field}': only message fields may reference a nested schema")]
    UnexpectedNestedSchema { field: String },

    #[error("field '{field}': reference to undefined message '{message}'")]
    UnknownMessage { field: String, message: String },

    #[error("message '{0}' is defined more than once")]
    DuplicateMessage(String),

    #[error("message '{message}': field '{field}' is defined more than once")]
    DuplicateField { message: String, field: String },

    #[error("root message '{0}' is not defined")]
    UnknownRoot(String),

    #[error("message '{message}': required field '{field}' recurses without end")]
    UnboundedRecursion { message: String, field: String },

    #[error("message reference chain exceeds {limit} levels")]
    ReferenceChainTooDeep { limit: usize },

    #[error("type tag '{0}' is already registered")]
    DuplicateTypeTag(char),

    #[error("type tag '{0}' cannot be registered with a nested layout")]
    ReservedLayout(char),
}

/// Errors raised while encoding a record.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("required field '{field}' is missing")]
    RequiredFieldMissing { field: String },

    #[error("field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("message nesting exceeds {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("optional field '{field}' was omitted but later fields carry data")]
    OmissionNotTrailing { field: String },
}

/// Errors raised while decoding a byte buffer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("input truncated: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: u64, remaining: usize },

    #[error("varint truncated at offset {offset}")]
    TruncatedVarint { offset: usize },

    #[error("varint at offset {offset} exceeds 64 bits")]
    VarintOverflow { offset: usize },

    #[error("invalid boolean state 0x{value:02x} at offset {offset}")]
    InvalidBooleanState { value: u8, offset: usize },

    #[error("message nesting exceeds {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("field '{field}': declared {declared} bytes but element data used {consumed}")]
    LengthMismatch {
        field: String,
        declared: u64,
        consumed: usize,
    },

    #[error("field '{field}': {count} elements exceeds limit of {limit}")]
    TooManyElements { field: String, count: u64, limit: usize },
}

impl DecodeError {
    /// Returns `true` when more input could have made the decode succeed.
    ///
    /// Callers reading from a link use this to decide between waiting for
    /// more bytes and discarding the frame.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. } | Self::TruncatedVarint { .. })
    }
}

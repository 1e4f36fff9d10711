//! Raw schema definitions and their compiled form.
//!
//! A raw schema names a set of messages and a root. Each field carries a spec
//! string of modifiers followed by one type tag (see [`crate::registry`]):
//!
//! - `*` required
//! - `+` repeated
//! - `#` packed repeated (fixed-width and varint types only)
//!
//! ```toml
//! root = "Reading"
//!
//! [[messages]]
//! name = "Reading"
//! fields = [
//!   { name = "station", spec = "*U" },
//!   { name = "samples", spec = "#z" },
//!   { name = "children", spec = "+m", message = "Reading" },
//! ]
//! ```
//!
//! Compilation resolves message references into [`SchemaId`] edges of an arena,
//! so a message may refer to itself or to an ancestor without being copied.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MAX_REFERENCE_CHAIN;
use crate::error::SchemaError;
use crate::registry::{FieldType, OptionalCodec, ScalarCodec, TypeRegistry};

const MOD_REQUIRED: char = '*';
const MOD_REPEATED: char = '+';
const MOD_PACKED: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    pub spec: String,
    /// Target message for `m` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RawField {
    pub fn new(name: impl Into<String>, spec: impl Into<String>) -> Self {
        Self { name: name.into(), spec: spec.into(), message: None }
    }

    pub fn nested(
        name: impl Into<String>,
        spec: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), spec: spec.into(), message: Some(message.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<RawField>,
}

/// Uncompiled schema, as written by hand or loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSchema {
    pub root: String,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

impl RawSchema {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into(), messages: Vec::new() }
    }

    /// Builder-style message definition.
    pub fn message(
        mut self,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = RawField>,
    ) -> Self {
        self.messages.push(RawMessage { name: name.into(), fields: fields.into_iter().collect() });
        self
    }

    pub fn from_toml(input: &str) -> Result<Self, SchemaError> {
        toml::from_str(input).map_err(|err| SchemaError::Parse(err.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

/// Index of a message node in a compiled [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the encoder and decoder do with a field's value.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Scalar(ScalarCodec),
    Message(SchemaId),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    required: bool,
    repeated: bool,
    packed: bool,
    kind: FieldKind,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn type_tag(&self) -> char {
        self.field_type.tag
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Target of a message field.
    pub fn nested(&self) -> Option<SchemaId> {
        match self.kind {
            FieldKind::Message(target) => Some(target),
            FieldKind::Scalar(_) => None,
        }
    }

    /// The tri-state style codec, when this field is optional and its type has one.
    pub fn optional_codec(&self) -> Option<OptionalCodec> {
        if self.required || self.repeated {
            return None;
        }
        self.field_type.optional_codec
    }

    pub fn uses_optional_codec(&self) -> bool {
        self.optional_codec().is_some()
    }

    /// The field spec this descriptor was compiled from, normalised.
    pub fn spec(&self) -> String {
        let modifier = if self.required {
            Some(MOD_REQUIRED)
        } else if self.packed {
            Some(MOD_PACKED)
        } else if self.repeated {
            Some(MOD_REPEATED)
        } else {
            None
        };
        modifier.into_iter().chain([self.field_type.tag]).collect()
    }
}

#[derive(Debug)]
pub struct MessageNode {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in wire order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A compiled, immutable schema graph.
///
/// Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Arc<[MessageNode]>,
    root: SchemaId,
}

impl Schema {
    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn root_message(&self) -> &MessageNode {
        self.message(self.root)
    }

    pub fn message(&self, id: SchemaId) -> &MessageNode {
        &self.nodes[id.0]
    }

    pub fn message_named(&self, name: &str) -> Option<SchemaId> {
        self.nodes.iter().position(|node| node.name == name).map(SchemaId)
    }

    pub fn messages(&self) -> impl Iterator<Item = (SchemaId, &MessageNode)> {
        self.nodes.iter().enumerate().map(|(index, node)| (SchemaId(index), node))
    }

    /// The same graph with a different root, sharing the node arena.
    pub fn with_root(&self, root: SchemaId) -> Option<Self> {
        (root.0 < self.nodes.len()).then(|| Self { nodes: Arc::clone(&self.nodes), root })
    }
}

/// Compiles a raw schema against the standard type table.
pub fn compile(raw: &RawSchema) -> Result<Schema, SchemaError> {
    SchemaCompiler::new(&TypeRegistry::standard()).compile(raw)
}

pub struct SchemaCompiler<'r> {
    registry: &'r TypeRegistry,
    max_reference_chain: usize,
}

struct Modifiers {
    required: bool,
    repeated: bool,
    packed: bool,
}

impl<'r> SchemaCompiler<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry, max_reference_chain: MAX_REFERENCE_CHAIN }
    }

    pub fn with_max_reference_chain(mut self, limit: usize) -> Self {
        self.max_reference_chain = limit;
        self
    }

    pub fn compile(&self, raw: &RawSchema) -> Result<Schema, SchemaError> {
        let result = self.compile_inner(raw);
        match &result {
            Ok(schema) => log::debug!(
                "schema: compiled {} messages, root '{}'",
                schema.nodes.len(),
                raw.root
            ),
            Err(err) => log::debug!("schema: rejected: {err}"),
        }
        result
    }

    fn compile_inner(&self, raw: &RawSchema) -> Result<Schema, SchemaError> {
        let mut ids = HashMap::with_capacity(raw.messages.len());
        for (index, message) in raw.messages.iter().enumerate() {
            if ids.insert(message.name.as_str(), SchemaId(index)).is_some() {
                return Err(SchemaError::DuplicateMessage(message.name.clone()));
            }
        }
        let root = *ids
            .get(raw.root.as_str())
            .ok_or_else(|| SchemaError::UnknownRoot(raw.root.clone()))?;

        let mut nodes = Vec::with_capacity(raw.messages.len());
        for message in &raw.messages {
            let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(message.fields.len());
            for raw_field in &message.fields {
                if fields.iter().any(|field| field.name == raw_field.name) {
                    return Err(SchemaError::DuplicateField {
                        message: message.name.clone(),
                        field: raw_field.name.clone(),
                    });
                }
                fields.push(self.compile_field(raw_field, &ids)?);
            }
            nodes.push(MessageNode { name: message.name.clone(), fields });
        }

        let depth = longest_chain(
            &nodes,
            root,
            &mut vec![false; nodes.len()],
            &mut vec![None; nodes.len()],
            1,
            self.max_reference_chain,
        )?;
        if depth > self.max_reference_chain {
            return Err(SchemaError::ReferenceChainTooDeep { limit: self.max_reference_chain });
        }

        let mut marks = vec![Mark::Unvisited; nodes.len()];
        for index in 0..nodes.len() {
            check_terminates(&nodes, SchemaId(index), &mut marks)?;
        }

        Ok(Schema { nodes: nodes.into(), root })
    }

    fn compile_field(
        &self,
        raw: &RawField,
        ids: &HashMap<&str, SchemaId>,
    ) -> Result<FieldDescriptor, SchemaError> {
        let tag = raw
            .spec
            .chars()
            .next_back()
            .ok_or_else(|| SchemaError::EmptySpec { field: raw.name.clone() })?;
        let field_type = *self
            .registry
            .lookup(tag)
            .ok_or_else(|| SchemaError::UnknownTypeTag { field: raw.name.clone(), tag })?;
        let modifiers = parse_modifiers(raw, &raw.spec[..raw.spec.len() - tag.len_utf8()])?;

        let invalid = |reason| SchemaError::InvalidModifiers {
            field: raw.name.clone(),
            spec: raw.spec.clone(),
            reason,
        };
        if modifiers.packed && !field_type.layout.is_packable() {
            return Err(invalid("packed fields need a fixed-width or varint type"));
        }

        let kind = match (field_type.is_nested(), &raw.message) {
            (true, Some(target)) => FieldKind::Message(*ids.get(target.as_str()).ok_or_else(
                || SchemaError::UnknownMessage { field: raw.name.clone(), message: target.clone() },
            )?),
            (true, None) => {
                return Err(SchemaError::MissingNestedSchema { field: raw.name.clone() })
            }
            (false, Some(_)) => {
                return Err(SchemaError::UnexpectedNestedSchema { field: raw.name.clone() })
            }
            (false, None) => {
                FieldKind::Scalar(field_type.codec.ok_or(SchemaError::ReservedLayout(tag))?)
            }
        };

        Ok(FieldDescriptor {
            name: raw.name.clone(),
            field_type,
            required: modifiers.required,
            repeated: modifiers.repeated,
            packed: modifiers.packed,
            kind,
        })
    }
}

fn parse_modifiers(raw: &RawField, prefix: &str) -> Result<Modifiers, SchemaError> {
    let invalid = |reason| SchemaError::InvalidModifiers {
        field: raw.name.clone(),
        spec: raw.spec.clone(),
        reason,
    };
    let mut modifiers = Modifiers { required: false, repeated: false, packed: false };
    for ch in prefix.chars() {
        let flag = match ch {
            MOD_REQUIRED => &mut modifiers.required,
            MOD_REPEATED => &mut modifiers.repeated,
            MOD_PACKED => &mut modifiers.packed,
            _ => return Err(invalid("unknown modifier")),
        };
        if *flag {
            return Err(invalid("duplicate modifier"));
        }
        *flag = true;
    }
    if modifiers.repeated && modifiers.packed {
        return Err(invalid("'+' and '#' are exclusive"));
    }
    if modifiers.required && (modifiers.repeated || modifiers.packed) {
        return Err(invalid("repeated fields cannot be required"));
    }
    modifiers.repeated |= modifiers.packed;
    Ok(modifiers)
}

fn nested_targets(node: &MessageNode) -> impl Iterator<Item = (&FieldDescriptor, SchemaId)> {
    node.fields.iter().filter_map(|field| field.nested().map(|target| (field, target)))
}

/// Length of the longest reference chain from `id`, not following references
/// back into the current path.
fn longest_chain(
    nodes: &[MessageNode],
    id: SchemaId,
    on_path: &mut [bool],
    memo: &mut [Option<usize>],
    level: usize,
    limit: usize,
) -> Result<usize, SchemaError> {
    if level > limit {
        return Err(SchemaError::ReferenceChainTooDeep { limit });
    }
    if let Some(depth) = memo[id.0] {
        return Ok(depth);
    }
    on_path[id.0] = true;
    let mut best = 1;
    for (_, target) in nested_targets(&nodes[id.0]) {
        if on_path[target.0] {
            continue;
        }
        best = best.max(1 + longest_chain(nodes, target, on_path, memo, level + 1, limit)?);
    }
    on_path[id.0] = false;
    memo[id.0] = Some(best);
    Ok(best)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Rejects cycles made only of required single message fields: such a
/// message would need infinitely many nested copies of itself.
fn check_terminates(
    nodes: &[MessageNode],
    id: SchemaId,
    marks: &mut [Mark],
) -> Result<(), SchemaError> {
    if marks[id.0] != Mark::Unvisited {
        return Ok(());
    }
    marks[id.0] = Mark::InProgress;
    let node = &nodes[id.0];
    for (field, target) in nested_targets(node) {
        if !field.required || field.repeated {
            continue;
        }
        if marks[target.0] == Mark::InProgress {
            return Err(SchemaError::UnboundedRecursion {
                message: node.name.clone(),
                field: field.name.clone(),
            });
        }
        check_terminates(nodes, target, marks)?;
    }
    marks[id.0] = Mark::Done;
    Ok(())
}

use anyhow::Result;
use serde::Serialize;
use styrene_codec::Schema;

use crate::cli::app::{CheckArgs, RuntimeContext};

#[derive(Debug, Clone, Serialize)]
pub struct SchemaSummary {
    pub root: String,
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub name: String,
    pub fields: Vec<FieldSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub spec: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn summarize(schema: &Schema) -> SchemaSummary {
    let messages = schema
        .messages()
        .map(|(_, node)| MessageSummary {
            name: node.name().to_owned(),
            fields: node
                .fields()
                .iter()
                .map(|field| FieldSummary {
                    name: field.name().to_owned(),
                    spec: field.spec(),
                    type_name: field.field_type().name,
                    message: field
                        .nested()
                        .map(|target| schema.message(target).name().to_owned()),
                })
                .collect(),
        })
        .collect();
    SchemaSummary { root: schema.root_message().name().to_owned(), messages }
}

pub fn render(summary: &SchemaSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for message in &summary.messages {
        let marker = if message.name == summary.root { " (root)" } else { "" };
        lines.push(format!("{}{marker}", message.name));
        let width = message.fields.iter().map(|field| field.name.len()).max().unwrap_or(0);
        for field in &message.fields {
            let target = field.message.as_deref().map(|name| format!(" -> {name}"));
            lines.push(format!(
                "  {:<width$}  {:<3} {}{}",
                field.name,
                field.spec,
                field.type_name,
                target.unwrap_or_default()
            ));
        }
    }
    lines
}

pub fn run(ctx: &RuntimeContext, args: &CheckArgs) -> Result<()> {
    let schema = ctx.load_schema(&args.schema, None)?;
    let summary = summarize(&schema);
    if ctx.output.json {
        return ctx.output.emit_status(&summary);
    }
    ctx.output.emit_lines(&render(&summary));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use styrene_codec::{compile, RawField, RawSchema};

    #[test]
    fn renders_every_field() {
        let schema = compile(
            &RawSchema::new("Tree")
                .message(
                    "Tree",
                    [RawField::new("label", "*U"), RawField::nested("kids", "+m", "Tree")],
                )
                .message("Spare", [RawField::new("weights", "#f")]),
        )
        .expect("schema");
        let lines = render(&summarize(&schema));
        assert_eq!(
            lines,
            vec![
                "Tree (root)".to_owned(),
                "  label  *U  string".to_owned(),
                "  kids   +m  message -> Tree".to_owned(),
                "Spare".to_owned(),
                "  weights  #f  float32".to_owned(),
            ]
        );
    }
}

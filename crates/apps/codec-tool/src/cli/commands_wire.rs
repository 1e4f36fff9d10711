use std::fs;
use std::io::Read;

use anyhow::{bail, Context, Result};
use styrene_codec::{Decoder, Encoder, Schema};

use crate::cli::app::{DecodeArgs, EncodeArgs, RuntimeContext};
use crate::cli::json;

/// Converts a JSON record and encodes it against the root of `schema`.
pub fn encode_json(
    ctx: &RuntimeContext,
    schema: &Schema,
    input: &serde_json::Value,
) -> Result<Vec<u8>> {
    let record = json::record_from_json(schema, input)?;
    Encoder::new(&ctx.config)
        .encode(schema, &record)
        .with_context(|| format!("failed to encode '{}'", schema.root_message().name()))
}

pub fn decode_json(
    ctx: &RuntimeContext,
    schema: &Schema,
    bytes: &[u8],
) -> Result<serde_json::Value> {
    let (record, consumed) = Decoder::new(&ctx.config)
        .decode_prefix(schema, bytes)
        .with_context(|| format!("failed to decode '{}'", schema.root_message().name()))?;
    if consumed < bytes.len() {
        log::warn!("ignored {} trailing bytes after the message", bytes.len() - consumed);
    }
    Ok(json::record_to_json(schema, &record))
}

pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
    hex::decode(digits).context("invalid hex input")
}

pub fn run_encode(ctx: &RuntimeContext, args: &EncodeArgs) -> Result<()> {
    let schema = ctx.load_schema(&args.schema, args.message.as_deref())?;
    let text = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read record {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read record from stdin")?;
            text
        }
    };
    let input: serde_json::Value =
        serde_json::from_str(&text).context("record is not valid JSON")?;
    let bytes = encode_json(ctx, &schema, &input)?;
    log::info!("encoded '{}' into {} bytes", schema.root_message().name(), bytes.len());

    if let Some(path) = &args.output {
        return fs::write(path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()));
    }
    if ctx.output.json {
        return ctx.output.emit_status(&serde_json::json!({
            "message": schema.root_message().name(),
            "len": bytes.len(),
            "hex": hex::encode(&bytes),
        }));
    }
    ctx.output.emit_message(hex::encode(&bytes));
    Ok(())
}

pub fn run_decode(ctx: &RuntimeContext, args: &DecodeArgs) -> Result<()> {
    let schema = ctx.load_schema(&args.schema, args.message.as_deref())?;
    let bytes = match (&args.hex, &args.input) {
        (Some(text), _) => parse_hex(text)?,
        (None, Some(path)) => {
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        (None, None) => bail!("either --hex or --input is required"),
    };
    let record = decode_json(ctx, &schema, &bytes)?;
    ctx.output.emit_status(&record)
}

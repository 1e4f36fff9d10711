use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use styrene_codec::{CodecConfig, RawSchema, Schema, SchemaCompiler, TypeRegistry};

use crate::cli::commands_check;
use crate::cli::commands_wire;
use crate::cli::output::Output;

#[derive(Debug, Clone, Parser)]
#[command(name = "styrene-codec", about = "styrene-codec schema and wire tool", version)]
pub struct Cli {
    /// Codec limits file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub json: bool,
    /// Raise log verbosity; repeat for more.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compile a schema and list its messages.
    Check(CheckArgs),
    /// Encode a JSON record into wire bytes.
    Encode(EncodeArgs),
    /// Decode wire bytes into a JSON record.
    Decode(DecodeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    pub schema: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct EncodeArgs {
    pub schema: PathBuf,
    /// JSON record; stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Write raw bytes here instead of printing hex.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Use this message instead of the schema root.
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DecodeArgs {
    pub schema: PathBuf,
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub hex: Option<String>,
    /// File holding raw wire bytes.
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub message: Option<String>,
}

pub struct RuntimeContext {
    pub config: CodecConfig,
    pub output: Output,
}

impl RuntimeContext {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => CodecConfig::from_path(path)
                .with_context(|| format!("failed to load codec config {}", path.display()))?,
            None => CodecConfig::default(),
        };
        Ok(Self { config, output: Output::new(cli.json) })
    }

    /// Reads and compiles a schema file, optionally re-rooted at `message`.
    pub fn load_schema(&self, path: &Path, message: Option<&str>) -> Result<Schema> {
        let raw = RawSchema::from_path(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?;
        let registry = TypeRegistry::standard();
        let schema = SchemaCompiler::new(&registry)
            .with_max_reference_chain(self.config.max_reference_chain)
            .compile(&raw)
            .with_context(|| format!("invalid schema {}", path.display()))?;

        let Some(name) = message else {
            return Ok(schema);
        };
        let id = schema
            .message_named(name)
            .with_context(|| format!("schema has no message '{name}'"))?;
        schema.with_root(id).context("message id outside schema")
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let ctx = RuntimeContext::load(&cli)?;
    match &cli.command {
        Command::Check(args) => commands_check::run(&ctx, args),
        Command::Encode(args) => commands_wire::run_encode(&ctx, args),
        Command::Decode(args) => commands_wire::run_decode(&ctx, args),
    }
}

use std::path::PathBuf;

use clap::Parser;
use codec_tool::cli::app::{Cli, Command, DecodeArgs, EncodeArgs};

#[test]
fn parses_encode_command() {
    let cli = Cli::try_parse_from([
        "styrene-codec",
        "-vv",
        "--config",
        "limits.toml",
        "encode",
        "schema.toml",
        "--input",
        "record.json",
        "--message",
        "Fix",
    ])
    .unwrap();

    assert_eq!(cli.log_filter(), "debug");
    assert_eq!(cli.config, Some(PathBuf::from("limits.toml")));
    match cli.command {
        Command::Encode(EncodeArgs { schema, input, output, message }) => {
            assert_eq!(schema, PathBuf::from("schema.toml"));
            assert_eq!(input, Some(PathBuf::from("record.json")));
            assert!(output.is_none());
            assert_eq!(message.as_deref(), Some("Fix"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_decode_with_global_json_after_subcommand() {
    let cli = Cli::try_parse_from(["styrene-codec", "decode", "s.toml", "--hex", "0a", "--json"])
        .unwrap();
    assert!(cli.json);
    assert_eq!(cli.log_filter(), "warn");
    match cli.command {
        Command::Decode(DecodeArgs { hex, input, .. }) => {
            assert_eq!(hex.as_deref(), Some("0a"));
            assert!(input.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn decode_needs_exactly_one_source() {
    assert!(Cli::try_parse_from(["styrene-codec", "decode", "s.toml"]).is_err());
    assert!(Cli::try_parse_from([
        "styrene-codec",
        "decode",
        "s.toml",
        "--hex",
        "00",
        "--input",
        "wire.bin",
    ])
    .is_err());
}

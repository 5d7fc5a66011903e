//! Tests for urls and digest.

use super::parse;
use crate::cli::CliCommand;
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_urls() {
    match parse(&["gatecheck", "urls", "--manifest", "assets.toml"]) {
        CliCommand::Urls { target } => {
            assert_eq!(target.manifest, Some(PathBuf::from("assets.toml")));
        }
        _ => panic!("expected Urls"),
    }
}

#[test]
fn cli_parse_digest() {
    match parse(&["gatecheck", "digest", ".test_assets/nft0.png"]) {
        CliCommand::Digest { path } => {
            assert_eq!(path, PathBuf::from(".test_assets/nft0.png"));
        }
        _ => panic!("expected Digest"),
    }
}

#[test]
fn cli_parse_digest_requires_path() {
    assert!(crate::cli::Cli::try_parse_from(["gatecheck", "digest"]).is_err());
}

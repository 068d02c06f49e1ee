//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}


#[test]
fn cli_parse_config_with_global_path() {
    let cli = Cli::try_parse_from(["fanout", "config", "--config", "/tmp/fanout.toml"]).unwrap();
    assert!(matches!(cli.command, CliCommand::Config));
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/fanout.toml")));
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["fanout", "download"]).is_err());
}

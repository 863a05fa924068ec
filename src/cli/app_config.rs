use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The request url,like http://www.example.com
    pub url: String,
    /// Suppress non-errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    /// Disable TLS verification
    #[arg(short = 'k', long = "skip-verify")]
    pub skip_verify: bool,
    /// Total request duration timeout
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "duration",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,
    /// PEM file with the CA certificates to trust instead of the built-in roots
    #[arg(short = 'c', long = "cacert", value_name = "file")]
    pub ca_file: Option<PathBuf>,
    /// Make the operation more talkative
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}

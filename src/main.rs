use clap::Parser;
use rfetch::app::run::main_with_error;
use rfetch::cli::app_config::Cli;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli: Cli = Cli::parse();
    main_with_error(cli).await
}

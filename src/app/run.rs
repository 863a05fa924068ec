use crate::app::report::{Reporter, ResponseSummary};
use crate::cli::app_config::Cli;
use crate::http::client::HttpClient;
use crate::http::transport::InstrumentedTransport;
use crate::tls::config::TlsOptions;
use anyhow::Context;
use http::StatusCode;
use hyper::Uri;
use std::process::ExitCode;

pub async fn main_with_error(cli: Cli) -> ExitCode {
    let reporter = match Reporter::new(cli.verbosity, cli.quiet) {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let _guard = reporter.install();

    match do_request(&cli, &reporter).await {
        Ok(code) => code,
        Err(e) => {
            reporter.setup_failed(&e);
            ExitCode::FAILURE
        }
    }
}

/// Setup problems come back as `Err`; a failed request is reported here and
/// turned into a failing exit code.
async fn do_request(cli: &Cli, reporter: &Reporter) -> Result<ExitCode, anyhow::Error> {
    let uri: Uri = cli
        .url
        .parse()
        .with_context(|| format!("Invalid url {}", cli.url))?;
    ensure!(
        matches!(uri.scheme_str(), Some("http" | "https")),
        "Can not find http or https scheme in the uri:{}.",
        uri
    );
    ensure!(uri.host().is_some(), "Can not find host in the uri:{}.", uri);

    let tls_config = TlsOptions {
        skip_verify: cli.skip_verify,
        ca_file: cli.ca_file.clone(),
    }
    .build()?;
    let transport = InstrumentedTransport::new(Some(tls_config))?;
    let mut client = HttpClient::new(transport, cli.timeout);

    let response = match client.get(&uri).await {
        Ok(response) => response,
        Err(e) => {
            reporter.request_failed(&client.transport().timings(), &e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let timings = client.transport().timings();

    let (parts, body) = response.into_parts();
    let body = client.read_body(body).await;
    let summary = ResponseSummary::new(&parts, body.size);

    if let Some(e) = body.error.as_ref() {
        reporter.body_failed(&timings, &summary, e);
    }
    if parts.status == StatusCode::OK {
        reporter.success(&timings, &summary);
    } else {
        reporter.unexpected_status(&timings, &summary);
    }
    Ok(ExitCode::SUCCESS)
}

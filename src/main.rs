use std::{io, process::ExitCode};

use clap::Parser;
use cognito_assume_role::cli::Cli;
use tracing::{Level, subscriber};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// AWS SDK crates that are noisy below trace level
const SDK_TARGETS: [&str; 6] = [
    "aws_config",
    "aws_smithy_runtime",
    "aws_smithy_runtime_api",
    "aws_sdk_cognitoidentity",
    "aws_sdk_cognitoidentityprovider",
    "hyper",
];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    // Allow RUST_LOG env var to override verbosity flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose)));

    // stdout is reserved for the credentials JSON
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3)
        .compact()
        .finish();

    subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn filter_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut directives = vec![level.to_string()];
    if verbose < 3 {
        directives.extend(SDK_TARGETS.iter().map(|target| format!("{target}=warn")));
    }
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_quiet_sdk() {
        let directives = filter_directives(2);
        assert!(directives.starts_with("DEBUG,"));
        assert!(directives.contains("aws_smithy_runtime=warn"));
        assert!(directives.contains("aws_sdk_cognitoidentityprovider=warn"));
    }

    #[test]
    fn test_filter_directives_trace_everything() {
        assert_eq!(filter_directives(3), "TRACE");
        assert_eq!(filter_directives(7), "TRACE");
    }

    #[test]
    fn test_filter_directives_default_warn() {
        assert!(filter_directives(0).starts_with("WARN,"));
    }
}

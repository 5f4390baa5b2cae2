use std::path::PathBuf;

use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use dotcomplete_lsp::config::{ConfigLayer, OracleLayer};
use dotcomplete_lsp::{Backend, BackendOptions};

/// Member completion language server backed by an external type oracle.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Shell command that starts the type oracle.
    #[arg(long, value_name = "COMMAND")]
    oracle_command: Option<String>,

    /// Directory the oracle is started in (defaults to the workspace root).
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Read settings from this TOML file, after the user and workspace files.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter for stderr, e.g. `debug` or `dotcomplete_lsp=trace`.
    /// Falls back to `RUST_LOG`, then `info`.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl Cli {
    fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            oracle: OracleLayer {
                command: self.oracle_command.clone(),
                working_dir: self.working_dir.clone(),
                timeout_secs: None,
            },
            ..ConfigLayer::default()
        }
    }
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // stdout carries the LSP protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let options = BackendOptions {
        cli_layer: cli.config_layer(),
        config_path: cli.config,
        ignore_config_files: false,
    };

    let (service, socket) = LspService::new(|client| Backend::new(client, options));
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}

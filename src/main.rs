mod config;
mod generate;
mod host;
mod llm;
mod sandbox;
mod store;
mod ui;
mod unit;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::generate::Orchestrator;
use crate::host::Host;
use crate::llm::{AnthropicClient, LlmClient};
use crate::sandbox::Sandbox;
use crate::store::UnitStore;

fn print_help() {
    println!(
        "\
appforge v{}

Generates small interactive apps from natural-language requests and runs
them in a sandboxed Luau runtime, right in your terminal.

USAGE:
    appforge [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/appforge.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG              Log level filter for tracing
                          (e.g. debug, appforge=debug,warn)
    ANTHROPIC_API_KEY     API key for Anthropic Claude models
                          (from https://console.anthropic.com/)

EXAMPLES:
    appforge                             # uses config/appforge.toml
    appforge /etc/appforge/config.toml   # custom config path
    RUST_LOG=debug appforge              # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("appforge v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appforge=info")),
        )
        .init();

    println!(
        r#"
      _               _____
     / \   _ __  _ __|  ___|__  _ __ __ _  ___
    / _ \ | '_ \| '_ \ |_ / _ \| '__/ _` |/ _ \
   / ___ \| |_) | |_) |  _| (_) | | | (_| |  __/
  /_/   \_\ .__/| .__/|_|  \___/|_|  \__, |\___|
          |_|   |_|                  |___/   v{}
"#,
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/appforge.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    info!("Agent: {}", config.agent.name);
    info!("LLM: {} ({})", config.llm.provider, config.llm.model);
    info!("Storage: {}", config.storage.path.display());

    let llm: Arc<dyn LlmClient> = match config.llm.provider.as_str() {
        "anthropic" => Arc::new(AnthropicClient::new(config.llm.clone())?),
        other => return Err(anyhow!("Unknown LLM provider: {other}")),
    };
    let llm_description = llm.description();

    let sandbox = Sandbox::new(config.sandbox.memory_limit_kb)?;
    let store = UnitStore::open(&config.storage.path)?;
    let orchestrator = Orchestrator::new(llm, sandbox.registry().names().to_vec());

    let mut host = Host::new(config, store, sandbox, orchestrator, llm_description);

    tokio::select! {
        result = host.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
            Ok(())
        }
    }
}

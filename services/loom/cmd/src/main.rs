//! Loom controller binary.
//!
//! Serves the mobile application's command channel and the bulk pattern channel
//! for one controller board, storing received patterns on the host.

use anyhow::Context;
use clap::Parser;
use loom_session::{Dispatcher, ProtocolEngine, Runtime, TransferSession};
use loom_storage::open_store;
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::{BoardVariant, LoomConfig};
use logging::LoomLogFormatter;

/// Loom controller packet protocol service
#[derive(Parser, Debug)]
#[command(name = "loom", version, about = "Loom controller packet protocol service")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "loom.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Board variant (overrides the config file)
    #[arg(long, value_enum)]
    board: Option<BoardVariant>,

    /// Command channel address, e.g. 0.0.0.0:5000
    #[arg(long)]
    command_addr: Option<SocketAddr>,

    /// Bulk channel address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bulk_addr: Option<SocketAddr>,

    /// Directory for received pattern files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Reply with error codes to unknown commands and rejected transfers
    #[arg(long)]
    explicit_errors: bool,

    /// Simulated station association time, e.g. 3s
    #[arg(long)]
    join_delay: Option<humantime::Duration>,
}

impl Args {
    /// Flags win over file and environment settings
    fn apply_to(&self, config: &mut LoomConfig) {
        if let Some(board) = self.board {
            config.board = board;
        }
        if let Some(addr) = self.command_addr {
            config.command_addr = addr;
        }
        if let Some(addr) = self.bulk_addr {
            config.bulk_addr = addr;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if self.explicit_errors {
            config.protocol.explicit_errors = true;
        }
        if let Some(delay) = &self.join_delay {
            config.join_delay = Some(delay.to_string());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("loom={}", args.log_level).parse()?)
        .add_directive(format!("loom_session={}", args.log_level).parse()?)
        .add_directive(format!("loom_storage={}", args.log_level).parse()?)
        .add_directive(format!("loom_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .event_format(LoomLogFormatter::new("loom"))
        .init();

    component_info!("main", "Starting loom controller v{}", env!("CARGO_PKG_VERSION"));

    let mut config = LoomConfig::load_from_file(&args.config)?;
    args.apply_to(&mut config);
    component_info!(
        "main",
        "Board {}: command {} ({}), bulk {}, storage {:?}, explicit errors {}",
        config.board,
        config.command_addr,
        config.board.transport(),
        if config.board.has_bulk_channel() {
            config.bulk_addr.to_string()
        } else {
            "disabled".to_string()
        },
        config.storage_mode(),
        config.protocol.explicit_errors
    );

    let store = open_store(config.storage_mode()).context("failed to open pattern storage")?;
    let dispatcher = Dispatcher::new(TransferSession::new(store), config.network_link()?)
        .with_explicit_errors(config.protocol.explicit_errors);
    let engine = ProtocolEngine::new(dispatcher);

    let runtime = Runtime::bind(config.runtime_config(), engine)
        .await
        .context("failed to bind controller channels")?;

    let stats = runtime
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                component_error!("main", "Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    component_info!(
        "main",
        "Loom controller stopped: {} frames dispatched, {} replies, {} bulk bytes",
        stats.engine.frames_dispatched,
        stats.engine.responses_sent,
        stats.bulk_bytes_in
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "loom",
            "--board",
            "cble-iot",
            "--command-addr",
            "127.0.0.1:7000",
            "--explicit-errors",
            "--join-delay",
            "500ms",
        ]);

        let mut config = LoomConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.board, BoardVariant::CbleIot);
        assert_eq!(config.command_addr.port(), 7000);
        assert!(config.protocol.explicit_errors);
        assert_eq!(
            config.join_delay().unwrap(),
            Some(std::time::Duration::from_millis(500))
        );
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::parse_from(["loom"]);
        let mut config = LoomConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config, LoomConfig::default());
    }
}

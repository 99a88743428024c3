use std::path::PathBuf;

use clap::Parser;
use metaserver::config::ServerConfig;
use metaserver::{MetaserverError, ServerBuilder, logging};
use metaserver_session::MemoryCredentials;

/// Metaserver -- lobby server for hosted multiplayer games
#[derive(Parser, Debug)]
#[command(name = "metaserver")]
#[command(about = "Lobby server: login, chat, game listing and game liveness checks")]
#[command(version)]
struct Cli {
    /// JSON config file. Every field is optional.
    #[arg(long, short = 'c', env = "METASERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:7395.
    #[arg(long, env = "METASERVER_BIND")]
    bind: Option<String>,

    /// Port hosted game servers listen on.
    #[arg(long, env = "METASERVER_GAME_PORT")]
    game_port: Option<u16>,

    /// Credential file: `.json`, or one `name<TAB>password<TAB>PERMISSION` per line.
    #[arg(long, env = "METASERVER_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Message of the day shown after login.
    #[arg(long, env = "METASERVER_MOTD")]
    motd: Option<String>,

    /// Log JSON lines instead of text.
    #[arg(long, env = "METASERVER_LOG_JSON")]
    log_json: bool,

    /// Validate configuration and exit without starting the server.
    #[arg(long, conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the merged configuration as JSON and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

impl Cli {
    /// Loads the config file, if any, and lays the flags over it.
    fn into_config(self) -> Result<ServerConfig, MetaserverError> {
        let mut cfg = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            cfg.bind = bind;
        }
        if let Some(port) = self.game_port {
            cfg.game_port = port;
        }
        if let Some(path) = self.credentials {
            cfg.credentials = Some(path);
        }
        if let Some(motd) = self.motd {
            cfg.motd = Some(motd);
        }
        if self.log_json {
            cfg.log.json = true;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<(), MetaserverError> {
    let cli = Cli::parse();
    let validate_only = cli.validate_config;
    let print_config = cli.print_config;
    let cfg = cli.into_config()?;

    if print_config {
        match serde_json::to_string_pretty(&cfg) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("failed to serialize config: {e}"),
        }
        return Ok(());
    }

    cfg.validate()?;
    if validate_only {
        println!("Configuration validation passed");
        println!("  Bind: {}", cfg.bind);
        println!("  Game port: {}", cfg.game_port);
        println!("  Protocol versions: {:?}", cfg.supported_protocol_versions);
        return Ok(());
    }

    logging::init(&cfg.log);

    let credentials = match &cfg.credentials {
        Some(path) => {
            let store = MemoryCredentials::load(path)?;
            tracing::info!(path = %path.display(), users = store.len(), "credentials loaded");
            store
        }
        None => {
            tracing::info!("no credential file, registered logins will fail");
            MemoryCredentials::new()
        }
    };

    let server = ServerBuilder::new().config(cfg).build(credentials).await?;
    tracing::info!(addr = %server.local_addr()?, "starting metaserver");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "heron")]
#[command(about = "Heron CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: HERON_CONFIG_PATH or ~/.heron/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway (Slack events webhook + greeting probe). Point the
    /// Slack app's event subscription URL at /slack/events.
    Gateway {
        /// Config file path (default: HERON_CONFIG_PATH or ~/.heron/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the bot user id for the configured Slack token (auth.test).
    Whoami {
        /// Config file path (default: HERON_CONFIG_PATH or ~/.heron/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("heron {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Whoami { config }) => {
            if let Err(e) = run_whoami(config).await {
                log::error!("whoami failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}

async fn run_whoami(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let token = lib::config::resolve_slack_bot_token(&config).ok_or_else(|| {
        anyhow::anyhow!("slack bot token not configured (set SLACK_BOT_TOKEN or slack.botToken)")
    })?;
    let slack = lib::channels::SlackChannel::new(config.slack.base_url.clone(), token);
    let user_id = slack.auth_test().await?;
    println!("bot user id: {}", user_id);
    Ok(())
}

mod console;
mod session;
mod settings;

use clap::Parser;
use console::{Console, StdioOperator};
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_types::validate::validate_config;
use session::Session;
use settings::Overrides;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sahunt", about = "Kubernetes ServiceAccount escalation console")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// API server address, `host:port` or URL
    #[arg(long)]
    api_server: Option<String>,

    /// Cluster node name of the controlled host
    #[arg(long)]
    node_name: Option<String>,

    /// SSH address of the controlled host
    #[arg(long)]
    ssh_host: Option<String>,

    /// Where captured tokens are written
    #[arg(long)]
    loot_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with the console on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let overrides = Overrides {
        api_server: cli.api_server,
        node_name: cli.node_name,
        ssh_host: cli.ssh_host,
        loot_dir: cli.loot_dir,
    };
    let config = settings::load(&cli.config, &overrides)?;
    validate_config(&config)?;

    info!("Starting sahunt");
    info!("  API server:      {}", config.kube.api_server);
    info!("  Controlled node: {} ({})", config.ssh.node_name, config.ssh.host);
    info!("  Loot dir:        {}", config.loot_dir);

    let session = Session::open(config)?;
    let operator = StdioOperator::new(std::io::stdin().lock(), std::io::stdout());
    let mut console = Console::new(operator, session, cli.config, overrides, Box::new(Session::open));
    console.run().await;

    Ok(())
}

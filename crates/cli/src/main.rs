use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "overtone", about = "Spotify listening-stats backend", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "overtone.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Initialize the data directory, configuration, and encryption key
    Init {
        /// Data directory path
        #[arg(long, default_value = "/var/lib/overtone")]
        data_dir: String,
    },
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            commands::init::run(&cli.config, &data_dir)?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&cli.config, port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};

    #[test]
    fn parses_serve_with_port() {
        let cli = Cli::parse_from(["overtone", "serve", "--port", "9090"]);
        match cli.command {
            Commands::Serve { port } => assert_eq!(port, 9090),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn init_uses_default_data_dir() {
        let cli = Cli::parse_from(["overtone", "init"]);
        match cli.command {
            Commands::Init { data_dir } => assert_eq!(data_dir, "/var/lib/overtone"),
            _ => panic!("expected init command"),
        }
    }

    #[test]
    fn config_flag_overrides_default() {
        let cli = Cli::parse_from(["overtone", "--config", "/etc/overtone.toml", "init"]);
        assert_eq!(cli.config, "/etc/overtone.toml");
    }
}

// Command line arguments

use clap::Parser;

use crate::config::{ServerConfig, DEFAULT_CONFIG_PATH};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ollama-relay",
    version,
    about = "Ollama-compatible local API that relays chat completions to OpenAI-compatible providers"
)]
pub struct Cli {
    /// Path to the YAML config file (watched for changes)
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Enable debug logging of proxied requests and responses
    #[arg(long, env = "DEBUG", value_parser = parse_debug)]
    pub debug: bool,

    /// Listen address, overrides `server.hostname`
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overrides `server.port`
    #[arg(long)]
    pub port: Option<u16>,

    /// Upstream connect timeout in seconds (default: transport default)
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,
}

/// `DEBUG` is shared with other tools (`DEBUG=express:*`), so values other
/// than an explicit truthy one turn debug logging off instead of failing.
fn parse_debug(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    ))
}

impl Cli {
    /// Apply command line overrides on top of the file's server section.
    pub fn server_config(&self, mut server: ServerConfig) -> ServerConfig {
        if let Some(host) = &self.host {
            server.hostname = host.clone();
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "ollama-relay",
            "--config",
            "/tmp/relay.yaml",
            "--port",
            "12000",
            "--connect-timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.config, "/tmp/relay.yaml");
        assert_eq!(cli.connect_timeout, Some(5));

        let server = cli.server_config(ServerConfig::default());
        assert_eq!(server.port, 12000);
        assert_eq!(server.hostname, "127.0.0.1");
    }

    #[test]
    fn test_debug_values() {
        assert_eq!(parse_debug("true"), Ok(true));
        assert_eq!(parse_debug("1"), Ok(true));
        assert_eq!(parse_debug("false"), Ok(false));
        assert_eq!(parse_debug("express:*"), Ok(false));
        assert_eq!(parse_debug(""), Ok(false));

        let cli = Cli::try_parse_from(["ollama-relay", "--debug"]).unwrap();
        assert!(cli.debug);
    }

    #[test]
    fn test_debug_env_does_not_block_startup() {
        std::env::set_var("DEBUG", "1");
        let cli = Cli::try_parse_from(["ollama-relay"]);
        std::env::set_var("DEBUG", "express:*");
        let other = Cli::try_parse_from(["ollama-relay"]);
        std::env::remove_var("DEBUG");

        assert!(cli.unwrap().debug);
        assert!(!other.unwrap().debug);
    }
}

use clap::Parser;
use tokio::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REMOTE_ADDR: &str = "localhost:8081";
pub const COPY_BUFFER_SIZE: usize = 8192;

/// Forwards all connections from listenAddress to remoteAddress.
#[derive(Parser, Debug, Clone)]
#[command(name = "port-forward", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(short = 'l', long = "listenAddress", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_address: String,

    /// Address to forward to
    #[arg(short = 'r', long = "remoteAddress", default_value = DEFAULT_REMOTE_ADDR)]
    pub remote_address: String,

    /// Close a direction after this many seconds without progress (disabled by default)
    #[arg(long = "idleTimeout", value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,
}

impl Config {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["port-forward"]).unwrap();
        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.remote_address, DEFAULT_REMOTE_ADDR);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_short_flags() {
        let config =
            Config::try_parse_from(["port-forward", "-l", "127.0.0.1:9000", "-r", "10.0.0.1:22"])
                .unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.remote_address, "10.0.0.1:22");
    }

    #[test]
    fn test_long_flags() {
        let config = Config::try_parse_from([
            "port-forward",
            "--listenAddress",
            "[::1]:7000",
            "--remoteAddress",
            "example.com:443",
            "--idleTimeout",
            "30",
        ])
        .unwrap();
        assert_eq!(config.listen_address, "[::1]:7000");
        assert_eq!(config.remote_address, "example.com:443");
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rejects_positional_arguments() {
        assert!(Config::try_parse_from(["port-forward", "extra"]).is_err());
    }
}

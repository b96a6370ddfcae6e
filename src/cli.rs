use clap::Parser;
use std::path::PathBuf;

/// Locator and detail maps for a place, in the terminal.
#[derive(Debug, Parser)]
#[command(name = "woeplanet-map", version, about)]
pub struct CliArgs {
    /// Configuration file, created with defaults when missing
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    pub config: PathBuf,

    /// Page URL to open instead of the configured one
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Directory for the rolling log files
    #[arg(long = "log-dir", value_name = "PATH", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["woeplanet-map"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert_eq!(args.url, None);
        assert_eq!(args.log_dir, PathBuf::from("logs"));
        assert!(!args.debug);
    }

    #[test]
    fn log_dir_is_known_before_config_is_read() {
        let args = CliArgs::try_parse_from([
            "woeplanet-map",
            "--config",
            "/etc/woeplanet/missing.toml",
            "--log-dir",
            "/var/log/woeplanet",
        ])
        .unwrap();
        assert_eq!(args.log_dir, PathBuf::from("/var/log/woeplanet"));
        assert_eq!(args.config, PathBuf::from("/etc/woeplanet/missing.toml"));
    }

    #[test]
    fn url_and_debug() {
        let args = CliArgs::try_parse_from([
            "woeplanet-map",
            "--url",
            "https://woeplanet.org/nearby/?lat=1&lng=2",
            "--debug",
        ])
        .unwrap();
        assert_eq!(
            args.url.as_deref(),
            Some("https://woeplanet.org/nearby/?lat=1&lng=2")
        );
        assert!(args.debug);
    }
}

//! CLI option and TOML config file parsing.
//!
//! clap handles the CLI surface, `toml`+`serde_derive` handle the
//! config file, merged in `parse_args` below.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use clap::{App, Arg};

/// Fully resolved runtime configuration, merged from defaults, an
/// optional config file, and CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UDP listen addresses for the statsd source.
    pub listen: Vec<String>,
    /// UDP listen port.
    pub port: u16,
    /// HTTP admin surface bind address.
    pub http_host: String,
    /// HTTP admin surface port.
    pub http_port: u16,
    /// Primary sink host.
    pub graphite_host: String,
    /// Primary sink port.
    pub graphite_port: u16,
    /// Primary sink reconnect interval, seconds.
    pub graphite_reconnect_interval: i64,
    /// Primary flush interval, seconds.
    pub flush_interval: u64,
    /// Prefix prepended to every primary record's metric name.
    pub prefix: String,
    /// Self-telemetry sink host.
    pub stats_host: String,
    /// Self-telemetry sink port.
    pub stats_port: u16,
    /// Self-telemetry sink reconnect interval, seconds.
    pub stats_reconnect_interval: i64,
    /// Self-telemetry flush interval, seconds.
    pub stats_flush_interval: u64,
    /// Prefix prepended to every self-telemetry record's metric name.
    pub stats_prefix: String,
    /// Logging verbosity, from `-v` occurrences (0 = Error .. 4 = Trace).
    #[serde(skip)]
    pub verbose: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen: vec!["0.0.0.0".to_string()],
            port: 8125,
            http_host: "0.0.0.0".to_string(),
            http_port: 8126,
            graphite_host: "127.0.0.1".to_string(),
            graphite_port: 2003,
            graphite_reconnect_interval: 5,
            flush_interval: 10,
            prefix: String::new(),
            stats_host: "127.0.0.1".to_string(),
            stats_port: 2003,
            stats_reconnect_interval: 5,
            stats_flush_interval: 10,
            stats_prefix: "stats".to_string(),
            verbose: 0,
        }
    }
}

/// Parse `-dnv`/`-f <conffile>` plus, if a config file is given,
/// merge its TOML contents over the defaults above.
///
/// Returns `Err` if `-n` (validate-only) was given and validation
/// failed, or if the config file couldn't be read/parsed.
pub fn parse_args() -> Result<(Config, bool, bool), String> {
    let matches = App::new("tallyd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("statsd-compatible metrics aggregation daemon")
        .arg(
            Arg::with_name("daemon")
                .short("d")
                .long("daemon")
                .help("Run in the foreground with verbose logging."),
        )
        .arg(
            Arg::with_name("check-config")
                .short("n")
                .long("check-config")
                .help("Validate the configuration file and exit."),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Increase logging verbosity. May be repeated."),
        )
        .arg(
            Arg::with_name("config-file")
                .short("f")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("Path to the TOML config file."),
        )
        .get_matches();

    let verbose = matches.occurrences_of("verbose");
    let check_only = matches.is_present("check-config");
    let daemon = matches.is_present("daemon");
    let config_path = matches
        .value_of("config-file")
        .unwrap_or("/etc/statsd.conf");

    let mut config = match read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            if Path::new(config_path).exists() {
                return Err(e);
            }
            Config::default()
        }
    };
    config.verbose = verbose;

    Ok((config, check_only, daemon))
}

fn read_config_file(path: &str) -> Result<Config, String> {
    let mut fp = File::open(path).map_err(|e| format!("could not open {}: {}", path, e))?;
    let mut buffer = String::new();
    fp.read_to_string(&mut buffer)
        .map_err(|e| format!("could not read {}: {}", path, e))?;
    toml::from_str(&buffer).map_err(|e| format!("could not parse {}: {}", path, e))
}

#[cfg(test)]
mod tests {
    extern crate tempdir;

    use super::*;
    use std::io::Write;
    use self::tempdir::TempDir;

    #[test]
    fn defaults_are_runnable() {
        let config = Config::default();
        assert_eq!(config.port, 8125);
        assert_eq!(config.http_port, 8126);
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let toml_text = r#"
            port = 9999
            prefix = "myapp"
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.prefix, "myapp");
        assert_eq!(config.http_port, 8126);
    }

    #[test]
    fn read_config_file_merges_over_defaults() {
        let dir = TempDir::new("tallyd-config-test").unwrap();
        let path = dir.path().join("statsd.conf");
        let mut fp = File::create(&path).unwrap();
        writeln!(fp, "port = 9000").unwrap();
        writeln!(fp, "graphite_host = \"10.0.0.1\"").unwrap();

        let config = read_config_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.graphite_host, "10.0.0.1");
        assert_eq!(config.flush_interval, 10);
    }

    #[test]
    fn read_config_file_missing_path_errors() {
        assert!(read_config_file("/nonexistent/tallyd-test.conf").is_err());
    }
}

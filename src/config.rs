//! Configuration types for netinv
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Device type selection
//! - Host list loading

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 8;

/// Upper bound on the connect timeout
const MAX_TIMEOUT_SECS: u64 = 600;

/// Parallel network device inventory collector
#[derive(Parser, Debug, Clone)]
#[command(
    name = "netinv",
    version,
    about = "Parallel network device inventory collector",
    long_about = "Logs into every host listed in the hosts file, runs one command,\n\
                  extracts a single field from the parsed response and writes\n\
                  one 'host,field' line per successful host.\n\n\
                  An authentication failure on any host stops the whole run.",
    after_help = "EXAMPLES:\n    \
        netinv -i ips.txt -o serials.txt\n    \
        netinv -i core.txt -w 32 --device-type cisco_ios\n    \
        NETINV_PASSWORD=secret netinv -u admin -i ips.txt -q"
)]
pub struct CliArgs {
    /// File with one host per line
    #[arg(short = 'i', long = "hosts", default_value = "ips.txt", value_name = "FILE")]
    pub hosts: PathBuf,

    /// Output file (truncated at start)
    #[arg(short, long, default_value = "serials.txt", value_name = "FILE")]
    pub output: PathBuf,

    /// Number of concurrent workers
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Command executed on every host
    #[arg(short = 'c', long, default_value = "show inventory", value_name = "CMD")]
    pub command: String,

    /// Device type of the targets
    #[arg(long, value_enum, default_value_t = DeviceType::CiscoAsa)]
    pub device_type: DeviceType,

    /// Field extracted from the first parsed record
    #[arg(short = 'f', long, default_value = "sn", value_name = "NAME")]
    pub field: String,

    /// Management port
    #[arg(long, default_value = "22", value_name = "PORT")]
    pub port: u16,

    /// Session connect timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Login username (prompted if not given)
    #[arg(short = 'u', long, env = "NETINV_USERNAME", value_name = "USER")]
    pub username: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Kind of device behind each host
///
/// Selects how a session drives the device: network OSes need an
/// interactive shell with paging disabled, plain servers take an exec
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceType {
    /// Cisco ASA firewall
    #[value(name = "cisco_asa")]
    CiscoAsa,
    /// Cisco IOS / IOS-XE
    #[value(name = "cisco_ios")]
    CiscoIos,
    /// Cisco NX-OS
    #[value(name = "cisco_nxos")]
    CiscoNxos,
    /// Generic Linux host
    #[value(name = "linux")]
    Linux,
}

impl DeviceType {
    /// Command that disables output paging, if the platform pages
    pub fn pager_off_command(&self) -> Option<&'static str> {
        match self {
            DeviceType::CiscoAsa => Some("terminal pager 0"),
            DeviceType::CiscoIos | DeviceType::CiscoNxos => Some("terminal length 0"),
            DeviceType::Linux => None,
        }
    }

    /// Whether commands must be typed into an interactive shell
    pub fn uses_shell(&self) -> bool {
        !matches!(self, DeviceType::Linux)
    }

    /// Name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::CiscoAsa => "cisco_asa",
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::CiscoNxos => "cisco_nxos",
            DeviceType::Linux => "linux",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Hosts file
    pub hosts_path: PathBuf,

    /// Output file
    pub output_path: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Command run on every host
    pub command: String,

    /// Device type selector
    pub device_type: DeviceType,

    /// Field extracted from the first parsed record
    pub field: String,

    /// Management port
    pub port: u16,

    /// Session connect timeout
    pub connect_timeout: Duration,

    /// Username given on the command line or environment
    pub username: Option<String>,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl CollectConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.timeout == 0 || args.timeout > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidTimeout {
                secs: args.timeout,
                max: MAX_TIMEOUT_SECS,
            });
        }

        let command = args.command.trim().to_string();
        if command.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }

        let field = args.field.trim().to_string();
        if field.is_empty() {
            return Err(ConfigError::EmptyField);
        }

        // Validate output path
        if let Some(parent) = args.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidOutputPath {
                    path: args.output.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }
        if args.output.is_dir() {
            return Err(ConfigError::InvalidOutputPath {
                path: args.output.clone(),
                reason: "Path is a directory".into(),
            });
        }

        Ok(Self {
            hosts_path: args.hosts,
            output_path: args.output,
            worker_count: args.workers,
            command,
            device_type: args.device_type,
            field,
            port: args.port,
            connect_timeout: Duration::from_secs(args.timeout),
            username: args.username.filter(|u| !u.trim().is_empty()),
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Parse host identifiers from newline-delimited text
///
/// Surrounding whitespace is trimmed; blank lines and `#` comments are
/// skipped. Order is preserved.
pub fn parse_hosts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the host list from a file
pub fn load_hosts(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::HostsFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let hosts = parse_hosts(&text);
    if hosts.is_empty() {
        return Err(ConfigError::NoHosts {
            path: path.to_path_buf(),
        });
    }
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["netinv"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = CollectConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.worker_count, DEFAULT_WORKERS);
        assert_eq!(config.command, "show inventory");
        assert_eq!(config.field, "sn");
        assert_eq!(config.device_type, DeviceType::CiscoAsa);
        assert_eq!(config.port, 22);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.hosts_path, PathBuf::from("ips.txt"));
        assert_eq!(config.output_path, PathBuf::from("serials.txt"));
        assert!(config.show_progress);
    }

    #[test]
    fn test_invalid_worker_count() {
        let err = CollectConfig::from_args(args(&["-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 0, .. }));

        let err = CollectConfig::from_args(args(&["-w", "10000"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { .. }));
    }

    #[test]
    fn test_blank_command_rejected() {
        let err = CollectConfig::from_args(args(&["-c", "   "])).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand));
    }

    #[test]
    fn test_missing_output_parent() {
        let err =
            CollectConfig::from_args(args(&["-o", "/definitely/not/here/out.txt"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOutputPath { .. }));
    }

    #[test]
    fn test_device_type_parsing() {
        let config = CollectConfig::from_args(args(&["--device-type", "linux"])).unwrap();
        assert_eq!(config.device_type, DeviceType::Linux);
        assert!(!config.device_type.uses_shell());
        assert_eq!(DeviceType::CiscoAsa.pager_off_command(), Some("terminal pager 0"));
        assert_eq!(DeviceType::CiscoIos.to_string(), "cisco_ios");
    }

    #[test]
    fn test_parse_hosts() {
        let hosts = parse_hosts("10.0.0.1\n\n  10.0.0.2  \n# core switches\nsw1.lab\n");
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2", "sw1.lab"]);
    }

    #[test]
    fn test_load_hosts_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ips.txt");
        std::fs::write(&path, "\n# nothing\n").unwrap();

        let err = load_hosts(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NoHosts { .. }));

        let err = load_hosts(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::HostsFile { .. }));
    }
}

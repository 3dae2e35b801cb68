// ABOUTME: CLI argument parsing and validation, converting raw flags into an immutable Config
// ABOUTME: Validation here is pure - no socket or thread is touched before Config exists

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

use crate::auth::{AuthConfig, AuthMode};
use crate::error::ConfigError;
use crate::frame::Separator;

/// Log verbosity selected by `-d`/`-q`, default otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

/// Raw command-line flags, one field per flag in the interface table.
#[derive(Debug, Parser)]
#[command(name = "streameye", version, about = "MJPEG-over-HTTP fan-out relay")]
pub struct Cli {
    /// Auth mode.
    #[arg(short = 'a', long = "auth", value_enum, default_value = "off")]
    pub auth: AuthMode,

    /// Credentials "user:pass:realm", required when -a basic.
    #[arg(short = 'c', long = "credentials")]
    pub credentials: Option<String>,

    /// Log level = debug.
    #[arg(short = 'd', long = "debug", conflicts_with = "quiet")]
    pub debug: bool,

    /// Bind to 127.0.0.1 only instead of 0.0.0.0.
    #[arg(short = 'l', long = "localhost")]
    pub localhost: bool,

    /// Max simultaneous clients, 0 = unlimited.
    #[arg(short = 'm', long = "max-clients", default_value_t = 0)]
    pub max_clients: u32,

    /// TCP port.
    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u32,

    /// Log level = error only.
    #[arg(short = 'q', long = "quiet", conflicts_with = "debug")]
    pub quiet: bool,

    /// Explicit input separator; auto-detect if absent.
    #[arg(short = 's', long = "separator")]
    pub separator: Option<String>,

    /// Per-client read/write timeout, in seconds.
    #[arg(short = 't', long = "timeout", default_value_t = 10)]
    pub timeout: u64,
}

/// Validated, immutable configuration derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub max_clients: usize,
    pub client_timeout_secs: u64,
    pub separator: Separator,
    pub log_level: LogLevel,
}

impl Config {
    /// Validates `cli` and splits out the auth configuration, which the
    /// caller keeps separately since it is consumed by sessions rather
    /// than the producer loop.
    pub fn from_cli(cli: &Cli) -> Result<(Self, AuthConfig), ConfigError> {
        let port: u16 = cli
            .port
            .try_into()
            .map_err(|_| ConfigError::InvalidPort(cli.port))?;

        let host = if cli.localhost {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };

        let separator = match &cli.separator {
            None => Separator::Auto,
            Some(s) if s.is_empty() => return Err(ConfigError::EmptySeparator),
            Some(s) => Separator::Explicit(s.as_bytes().to_vec()),
        };

        let log_level = if cli.debug {
            LogLevel::Debug
        } else if cli.quiet {
            LogLevel::Error
        } else {
            LogLevel::Info
        };

        let auth = match cli.auth {
            AuthMode::Off => AuthConfig::off(),
            AuthMode::Basic => {
                let raw = cli.credentials.as_ref().ok_or(ConfigError::MissingCredentials)?;
                let mut parts = raw.splitn(3, ':');
                let (Some(user), Some(pass), Some(realm)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ConfigError::InvalidCredentials(raw.clone()));
                };
                if user.is_empty() || pass.is_empty() {
                    return Err(ConfigError::InvalidCredentials(raw.clone()));
                }
                AuthConfig::basic(user, pass, realm)
            }
        };

        Ok((
            Config {
                listen_addr: SocketAddr::new(host, port),
                max_clients: cli.max_clients as usize,
                client_timeout_secs: cli.timeout,
                separator,
                log_level,
            },
            auth,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            auth: AuthMode::Off,
            credentials: None,
            debug: false,
            localhost: false,
            max_clients: 0,
            port: 8080,
            quiet: false,
            separator: None,
            timeout: 10,
        }
    }

    #[test]
    fn defaults_bind_all_interfaces_with_auto_separator() {
        let (config, auth) = Config::from_cli(&base_cli()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert!(matches!(config.separator, Separator::Auto));
        assert_eq!(auth.mode(), AuthMode::Off);
    }

    #[test]
    fn localhost_flag_binds_loopback_only() {
        let mut cli = base_cli();
        cli.localhost = true;
        let (config, _auth) = Config::from_cli(&cli).unwrap();
        assert_eq!(config.listen_addr.ip(), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn basic_auth_without_credentials_is_a_config_error() {
        let mut cli = base_cli();
        cli.auth = AuthMode::Basic;
        assert!(matches!(
            Config::from_cli(&cli),
            Err(ConfigError::MissingCredentials)
        ));
    }

    #[test]
    fn basic_auth_splits_credentials_into_three_fields() {
        let mut cli = base_cli();
        cli.auth = AuthMode::Basic;
        cli.credentials = Some("alice:secret:cam".to_string());
        let (_config, auth) = Config::from_cli(&cli).unwrap();
        assert_eq!(auth.realm(), "cam");
        assert!(auth.authorize(Some("YWxpY2U6c2VjcmV0")));
    }

    #[test]
    fn credentials_realm_may_itself_contain_colons() {
        let mut cli = base_cli();
        cli.auth = AuthMode::Basic;
        cli.credentials = Some("alice:secret:front:door".to_string());
        let (_config, auth) = Config::from_cli(&cli).unwrap();
        assert_eq!(auth.realm(), "front:door");
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        let mut cli = base_cli();
        cli.auth = AuthMode::Basic;
        cli.credentials = Some("alice".to_string());
        assert!(matches!(
            Config::from_cli(&cli),
            Err(ConfigError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn empty_separator_is_rejected() {
        let mut cli = base_cli();
        cli.separator = Some(String::new());
        assert!(matches!(
            Config::from_cli(&cli),
            Err(ConfigError::EmptySeparator)
        ));
    }

    #[test]
    fn debug_and_quiet_select_log_level() {
        let mut cli = base_cli();
        cli.debug = true;
        let (config, _) = Config::from_cli(&cli).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);

        let mut cli = base_cli();
        cli.quiet = true;
        let (config, _) = Config::from_cli(&cli).unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
    }
}

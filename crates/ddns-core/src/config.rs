//! Configuration types for the DDNS client
//!
//! The configuration is a YAML document loaded once at startup and validated
//! before anything else runs. There is no reload; a changed file takes effect
//! on restart.
//!
//! ```yaml
//! hostname: host.example.org
//! interfaces: [eth0, -docker0, "*"]
//! enable_ipv4: true
//! enable_ipv6: true
//! update:
//!   type: http
//!   url: https://ddns.example.org/update
//!   username: host
//!   password: secret
//! hooks:
//!   - nft_sets_outfile: /etc/nftables.d/local-nets.nft
//!     shell: systemctl reload nftables
//! ```

use crate::filter::AddressFilter;
use crate::selector::FamilySet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Hostname whose records are kept in sync
    pub hostname: String,

    /// Interface allow/deny patterns
    #[serde(default)]
    pub interfaces: AddressFilter,

    /// Publish an A record
    #[serde(default = "default_enabled")]
    pub enable_ipv4: bool,

    /// Publish an AAAA record
    #[serde(default = "default_enabled")]
    pub enable_ipv6: bool,

    /// Tick length of the reconciliation loop (in seconds)
    #[serde(default = "default_min_period_secs")]
    pub min_period_secs: u64,

    /// Reconcile at least this often even without events (in seconds)
    #[serde(default = "default_force_refresh_period_secs")]
    pub force_refresh_period_secs: u64,

    /// Deadline for each external call (in seconds)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Delay before the first pass (in seconds)
    #[serde(default)]
    pub startup_delay_secs: u64,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub logfile: Option<PathBuf>,

    /// Where updates are delivered
    pub update: UpdateSinkConfig,

    /// Where the published records are read from
    ///
    /// Without one, drift is measured against the last address successfully
    /// delivered by this process.
    #[serde(default)]
    pub record_source: Option<RecordSourceConfig>,

    /// Actions run whenever the set of local addresses changes
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

impl DdnsConfig {
    /// Create a new configuration with defaults
    pub fn new(hostname: impl Into<String>, update: UpdateSinkConfig) -> Self {
        Self {
            hostname: hostname.into(),
            interfaces: AddressFilter::default(),
            enable_ipv4: default_enabled(),
            enable_ipv6: default_enabled(),
            min_period_secs: default_min_period_secs(),
            force_refresh_period_secs: default_force_refresh_period_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            startup_delay_secs: 0,
            debug: false,
            logfile: None,
            update,
            record_source: None,
            hooks: Vec::new(),
        }
    }

    /// Load and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML configuration document
    pub fn from_yaml(text: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.hostname)?;

        if !self.enable_ipv4 && !self.enable_ipv6 {
            return Err(crate::Error::config(
                "At least one of enable_ipv4 and enable_ipv6 must be set",
            ));
        }

        if self.min_period_secs == 0 {
            return Err(crate::Error::config("min_period_secs must be > 0"));
        }
        if self.force_refresh_period_secs < self.min_period_secs {
            return Err(crate::Error::config(format!(
                "force_refresh_period_secs ({}) must not be shorter than min_period_secs ({})",
                self.force_refresh_period_secs, self.min_period_secs
            )));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("call_timeout_secs must be > 0"));
        }

        self.interfaces.validate()?;
        self.update.validate()?;
        if let Some(source) = &self.record_source {
            source.validate()?;
        }
        for hook in &self.hooks {
            hook.validate()?;
        }

        Ok(())
    }

    pub fn min_period(&self) -> Duration {
        Duration::from_secs(self.min_period_secs)
    }

    pub fn force_refresh_period(&self) -> Duration {
        Duration::from_secs(self.force_refresh_period_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn families(&self) -> FamilySet {
        FamilySet {
            ipv4: self.enable_ipv4,
            ipv6: self.enable_ipv6,
        }
    }
}

/// Post-change hook
///
/// Either action may be omitted; when both are set the nft sets are written
/// before the command runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Shell command run with `sh -c`
    #[serde(default)]
    pub shell: Option<String>,

    /// File receiving `LOCAL_NET4`/`LOCAL_NET6` nft set definitions
    #[serde(default)]
    pub nft_sets_outfile: Option<PathBuf>,
}

impl HookConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.shell.is_none() && self.nft_sets_outfile.is_none() {
            return Err(crate::Error::config(
                "hook needs a shell command or an nft_sets_outfile",
            ));
        }
        if self.shell.as_ref().is_some_and(|cmd| cmd.trim().is_empty()) {
            return Err(crate::Error::config("hook shell command cannot be empty"));
        }
        Ok(())
    }
}

/// Update sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateSinkConfig {
    /// dyndns-style HTTP endpoint: `GET url?hostname=..&myip=..`
    Http {
        /// Update endpoint URL
        url: String,
        /// Basic auth user name
        #[serde(default)]
        username: Option<String>,
        /// Basic auth password
        #[serde(default)]
        password: Option<String>,
        /// Log the request instead of sending it
        #[serde(default)]
        dry_run: bool,
    },

    /// RFC 2136 dynamic update through the `nsupdate` tool
    Nsupdate {
        /// Primary server accepting updates
        server: String,
        /// Zone to update (inferred from SOA when absent)
        #[serde(default)]
        zone: Option<String>,
        /// TSIG key as `[alg:]name:secret`
        key: String,
        /// TTL of the published records
        #[serde(default = "default_ttl")]
        ttl: u32,
        /// Path to the `nsupdate` binary
        #[serde(default = "default_nsupdate_path")]
        nsupdate_path: String,
    },

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl UpdateSinkConfig {
    /// Validate the update sink configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            UpdateSinkConfig::Http { url, username, password, .. } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP update URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "HTTP update URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if password.is_some() && username.is_none() {
                    return Err(crate::Error::config(
                        "HTTP update password given without a username",
                    ));
                }
                Ok(())
            }
            UpdateSinkConfig::Nsupdate { server, key, ttl, .. } => {
                if server.is_empty() {
                    return Err(crate::Error::config("nsupdate server cannot be empty"));
                }
                if key.is_empty() {
                    return Err(crate::Error::config("nsupdate key cannot be empty"));
                }
                if *ttl == 0 {
                    return Err(crate::Error::config("nsupdate ttl must be > 0"));
                }
                Ok(())
            }
            UpdateSinkConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom update sink factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom update sink config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            UpdateSinkConfig::Http { .. } => "http",
            UpdateSinkConfig::Nsupdate { .. } => "nsupdate",
            UpdateSinkConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Authoritative record source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordSourceConfig {
    /// Query a name server with `dig`
    Dig {
        /// Server to query (normally the zone's primary)
        server: String,
        /// Path to the `dig` binary
        #[serde(default = "default_dig_path")]
        dig_path: String,
    },

    /// Custom record source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RecordSourceConfig {
    /// Validate the record source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RecordSourceConfig::Dig { server, .. } => {
                if server.is_empty() {
                    return Err(crate::Error::config("dig server cannot be empty"));
                }
                Ok(())
            }
            RecordSourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom record source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom record source config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the record source type name
    pub fn type_name(&self) -> &str {
        match self {
            RecordSourceConfig::Dig { .. } => "dig",
            RecordSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length and label characters.
/// A single trailing dot (fully qualified form) is accepted.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    let name = domain.strip_suffix('.').unwrap_or(domain);

    if name.is_empty() {
        return Err(crate::Error::config("Hostname cannot be empty"));
    }

    if name.len() > 253 {
        return Err(crate::Error::config(format!(
            "Hostname too long: {} chars (max 253). Got: {}",
            name.len(),
            domain
        )));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Hostname has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Hostname label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Hostname label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Hostname label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_enabled() -> bool {
    true
}

fn default_min_period_secs() -> u64 {
    60
}

fn default_force_refresh_period_secs() -> u64 {
    3600
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_ttl() -> u32 {
    60
}

fn default_nsupdate_path() -> String {
    "nsupdate".to_string()
}

fn default_dig_path() -> String {
    "dig".to_string()
}

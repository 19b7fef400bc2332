//! `dig` record source

use crate::fqdn;
use async_trait::async_trait;
use ddns_core::config::RecordSourceConfig;
use ddns_core::traits::{RecordSource, RecordSourceFactory, SyncRecord};
use ddns_core::{Error, Result};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

/// First line of `dig +short` output that parses as `T`
///
/// CNAME targets and other non-address lines are skipped.
pub fn parse_short_answer<T: FromStr>(output: &str) -> Option<T> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.parse().ok())
}

/// Record source querying one name server with `dig`
#[derive(Debug, Clone)]
pub struct DigRecordSource {
    server: String,
    dig_path: String,
}

impl DigRecordSource {
    pub fn new(server: impl Into<String>, dig_path: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            dig_path: dig_path.into(),
        }
    }

    fn command(&self, name: &str, qtype: &str) -> Command {
        let mut command = Command::new(&self.dig_path);
        command
            .arg("+short")
            .arg(format!("@{}", self.server))
            .arg(name)
            .arg(qtype)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn query<T: FromStr>(&self, name: &str, qtype: &str) -> Result<Option<T>> {
        let output = self.command(name, qtype).output().await.map_err(|e| {
            Error::record_source(format!("Failed to run {}: {}", self.dig_path, e))
        })?;

        if !output.status.success() {
            return Err(Error::record_source(format!(
                "dig {} {} exited with {}: {}",
                name,
                qtype,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!("dig @{} {} {}: {:?}", self.server, name, qtype, stdout.trim());
        Ok(parse_short_answer(&stdout))
    }
}

#[async_trait]
impl RecordSource for DigRecordSource {
    async fn lookup(&self, hostname: &str) -> Result<SyncRecord> {
        let name = fqdn(hostname);
        let ipv4 = self.query(&name, "A").await?;
        let ipv6 = self.query(&name, "AAAA").await?;

        Ok(SyncRecord {
            hostname: hostname.to_string(),
            ipv4,
            ipv6,
        })
    }

    fn source_name(&self) -> &'static str {
        "dig"
    }
}

/// Factory for creating dig record sources
pub struct DigSourceFactory;

impl RecordSourceFactory for DigSourceFactory {
    fn create(&self, config: &RecordSourceConfig) -> Result<Box<dyn RecordSource>> {
        match config {
            RecordSourceConfig::Dig { server, dig_path } => {
                Ok(Box::new(DigRecordSource::new(server.clone(), dig_path.clone())))
            }
            _ => Err(Error::config("Invalid config for dig record source")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_parse_plain_answer() {
        let v4: Option<Ipv4Addr> = parse_short_answer("85.207.1.2\n");
        assert_eq!(v4, Some(Ipv4Addr::new(85, 207, 1, 2)));
    }

    #[test]
    fn test_parse_skips_cname_lines() {
        let v6: Option<Ipv6Addr> = parse_short_answer("alias.example.org.\n2a01:4f8::1\n");
        assert_eq!(v6, Some("2a01:4f8::1".parse().unwrap()));
    }

    #[test]
    fn test_parse_empty_answer() {
        let v4: Option<Ipv4Addr> = parse_short_answer("");
        assert_eq!(v4, None);
    }

    #[test]
    fn test_command_line() {
        let source = DigRecordSource::new("ns1.example.org", "dig");
        let command = source.command("host.example.org.", "AAAA");
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, ["+short", "@ns1.example.org", "host.example.org.", "AAAA"]);
    }

    #[tokio::test]
    async fn test_lookup_with_no_addresses_in_output() {
        // `echo` prints its arguments back, none of which is an address
        let source = DigRecordSource::new("ns1.example.org", "echo");
        let record = source.lookup("host.example.org").await.unwrap();

        assert_eq!(record.hostname, "host.example.org");
        assert_eq!(record.ipv4, None);
        assert_eq!(record.ipv6, None);
    }

    #[tokio::test]
    async fn test_failed_query_is_error() {
        let source = DigRecordSource::new("ns1.example.org", "false");
        let result = source.lookup("host.example.org").await;
        assert!(matches!(result, Err(Error::RecordSource(_))));
    }

    #[test]
    fn test_factory() {
        let config = RecordSourceConfig::Dig {
            server: "ns1.example.org".to_string(),
            dig_path: "dig".to_string(),
        };
        let source = DigSourceFactory.create(&config).unwrap();
        assert_eq!(source.source_name(), "dig");
    }
}

//! `nsupdate` update sink

use crate::fqdn;
use async_trait::async_trait;
use ddns_core::config::UpdateSinkConfig;
use ddns_core::traits::{UpdateSink, UpdateSinkFactory};
use ddns_core::{Error, Result};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const SINK_NAME: &str = "nsupdate";

/// Build the `nsupdate` script replacing the given families' records
///
/// A family passed as `None` is not touched: only `A` and/or `AAAA` records
/// of the present families are deleted and re-added.
pub fn update_script(
    server: &str,
    zone: Option<&str>,
    hostname: &str,
    ttl: u32,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
) -> String {
    let name = fqdn(hostname);
    let mut script = String::new();

    let _ = writeln!(script, "server {}", server);
    if let Some(zone) = zone {
        let _ = writeln!(script, "zone {}", fqdn(zone));
    }
    if let Some(addr) = ipv4 {
        let _ = writeln!(script, "update delete {} A", name);
        let _ = writeln!(script, "update add {} {} A {}", name, ttl, addr);
    }
    if let Some(addr) = ipv6 {
        let _ = writeln!(script, "update delete {} AAAA", name);
        let _ = writeln!(script, "update add {} {} AAAA {}", name, ttl, addr);
    }
    script.push_str("send\n");
    script
}

/// Update sink running `nsupdate`
pub struct NsupdateSink {
    server: String,
    zone: Option<String>,
    /// TSIG key as `[alg:]name:secret`
    /// ⚠️ NEVER log this value
    key: String,
    ttl: u32,
    nsupdate_path: String,
}

impl std::fmt::Debug for NsupdateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NsupdateSink")
            .field("server", &self.server)
            .field("zone", &self.zone)
            .field("key", &"<REDACTED>")
            .field("ttl", &self.ttl)
            .field("nsupdate_path", &self.nsupdate_path)
            .finish()
    }
}

impl NsupdateSink {
    pub fn new(
        server: impl Into<String>,
        zone: Option<String>,
        key: impl Into<String>,
        ttl: u32,
        nsupdate_path: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            zone,
            key: key.into(),
            ttl,
            nsupdate_path: nsupdate_path.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.nsupdate_path);
        command
            .arg("-y")
            .arg(&self.key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, script: &str) -> Result<()> {
        let mut child = self.command().spawn().map_err(|e| {
            Error::update_sink(format!("Failed to run {}: {}", self.nsupdate_path, e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(script.as_bytes()).await {
                Ok(()) => {}
                // The exit status below tells what went wrong
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!("nsupdate closed stdin early");
                }
                Err(e) => return Err(Error::update_sink(format!("Failed to feed nsupdate: {}", e))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::update_sink(format!("Failed to wait for nsupdate: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            "nsupdate finished: {} stdout={:?} stderr={:?}",
            output.status,
            stdout.trim(),
            stderr.trim()
        );

        if !output.status.success() {
            return Err(Error::update_sink(format!(
                "nsupdate exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateSink for NsupdateSink {
    async fn apply(
        &self,
        hostname: &str,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<()> {
        if ipv4.is_none() && ipv6.is_none() {
            return Ok(());
        }

        let script = update_script(
            &self.server,
            self.zone.as_deref(),
            hostname,
            self.ttl,
            ipv4,
            ipv6,
        );
        tracing::info!("Running {} -y <hidden> against {}", self.nsupdate_path, self.server);
        tracing::debug!("nsupdate script:\n{}", script);

        self.run(&script).await
    }

    fn sink_name(&self) -> &'static str {
        SINK_NAME
    }
}

/// Factory for creating nsupdate sinks
pub struct NsupdateSinkFactory;

impl UpdateSinkFactory for NsupdateSinkFactory {
    fn create(&self, config: &UpdateSinkConfig) -> Result<Box<dyn UpdateSink>> {
        match config {
            UpdateSinkConfig::Nsupdate {
                server,
                zone,
                key,
                ttl,
                nsupdate_path,
            } => {
                if key.is_empty() {
                    return Err(Error::config("nsupdate key is required"));
                }
                Ok(Box::new(NsupdateSink::new(
                    server.clone(),
                    zone.clone(),
                    key.clone(),
                    *ttl,
                    nsupdate_path.clone(),
                )))
            }
            _ => Err(Error::config("Invalid config for nsupdate sink")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "hmac-sha256:ddns:c2VjcmV0";

    fn sink(path: &str) -> NsupdateSink {
        NsupdateSink::new("ns1.example.org", None, KEY, 60, path)
    }

    #[test]
    fn test_script_touches_only_given_family() {
        let script = update_script(
            "ns1.example.org",
            Some("example.org"),
            "host.example.org",
            300,
            None,
            Some("2a01:4f8::1".parse().unwrap()),
        );

        assert_eq!(
            script,
            "server ns1.example.org\n\
             zone example.org.\n\
             update delete host.example.org. AAAA\n\
             update add host.example.org. 300 AAAA 2a01:4f8::1\n\
             send\n"
        );
    }

    #[test]
    fn test_script_without_zone() {
        let script = update_script(
            "ns1.example.org",
            None,
            "host.example.org.",
            60,
            Some("85.207.1.2".parse().unwrap()),
            None,
        );

        assert!(!script.contains("zone"));
        assert!(script.contains("update delete host.example.org. A\n"));
        assert!(script.contains("update add host.example.org. 60 A 85.207.1.2\n"));
        assert!(script.ends_with("send\n"));
    }

    #[test]
    fn test_key_passed_with_y_flag() {
        let command = sink("nsupdate").command();
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, ["-y", KEY]);
    }

    #[test]
    fn test_key_not_exposed_in_debug() {
        let debug_output = format!("{:?}", sink("nsupdate"));
        assert!(!debug_output.contains("c2VjcmV0"));
        assert!(debug_output.contains("<REDACTED>"));
    }

    #[tokio::test]
    async fn test_successful_exit_is_success() {
        sink("true")
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_exit_is_error() {
        // `false` ignores its arguments and exits 1
        let err = sink("false")
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpdateSink(_)));
        assert!(!err.to_string().contains("c2VjcmV0"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let result = sink("/nonexistent/nsupdate")
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await;
        assert!(matches!(result, Err(Error::UpdateSink(_))));
    }

    #[tokio::test]
    async fn test_nothing_to_send_skips_nsupdate() {
        sink("/nonexistent/nsupdate")
            .apply("host.example.org", None, None)
            .await
            .unwrap();
    }
}

//! Post-change hooks
//!
//! Run after a pass whose local addresses differ from the previous pass.
//! A hook can write the host's on-link networks as nftables set definitions
//! and run a shell command. Failures are logged and never fail the pass.

use crate::config::HookConfig;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Render `LOCAL_NET4` and `LOCAL_NET6` nftables definitions
///
/// ```text
/// define LOCAL_NET4={
/// 85.207.1.0/24
/// }
/// define LOCAL_NET6={
/// 2a01:4f8:10a:1::/64
/// }
/// ```
pub fn nft_sets(networks: &BTreeSet<(IpAddr, u8)>) -> String {
    let mut out = String::new();
    render_set(&mut out, "LOCAL_NET4", networks.iter().filter(|(ip, _)| ip.is_ipv4()));
    render_set(&mut out, "LOCAL_NET6", networks.iter().filter(|(ip, _)| ip.is_ipv6()));
    out
}

fn render_set<'a>(out: &mut String, name: &str, networks: impl Iterator<Item = &'a (IpAddr, u8)>) {
    let entries: Vec<String> = networks.map(|(ip, len)| format!("{}/{}", ip, len)).collect();
    let _ = write!(out, "define {}={{\n{}\n}}\n", name, entries.join(",\n"));
}

/// Run every hook in order
pub async fn run_hooks(hooks: &[HookConfig], networks: &BTreeSet<(IpAddr, u8)>, limit: Duration) {
    for hook in hooks {
        if let Some(path) = &hook.nft_sets_outfile {
            info!("Writing nft sets to {}", path.display());
            if let Err(e) = tokio::fs::write(path, nft_sets(networks)).await {
                warn!("Cannot write nft sets to {}: {}", path.display(), e);
            }
        }

        if let Some(cmd) = &hook.shell {
            info!("Running hook: {}", cmd);
            let result = match tokio::time::timeout(limit, shell(cmd)).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(format!("hook after {:?}", limit))),
            };
            if let Err(e) = result {
                warn!("Hook `{}` failed: {}", cmd, e);
            }
        }
    }
}

async fn shell(cmd: &str) -> Result<()> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    debug!(
        "Hook `{}` finished: {} stdout={:?}",
        cmd,
        output.status,
        String::from_utf8_lossy(&output.stdout).trim()
    );
    if !output.status.success() {
        return Err(Error::Other(format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

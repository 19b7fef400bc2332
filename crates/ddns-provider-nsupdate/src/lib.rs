// # nsupdate / dig Provider
//
// RFC 2136 dynamic updates through the BIND `nsupdate` tool, and
// authoritative lookups through `dig`.
//
// ## Components
//
// - `NsupdateSink`: feeds an update script to `nsupdate -y <key>` on stdin
// - `DigRecordSource`: runs `dig +short @<server> <name> A|AAAA`
//
// Neither tool is reimplemented; both are spawned with `tokio::process` and
// killed if the calling future is dropped (e.g. on timeout).
//
// ## Security
//
// The TSIG key is passed on the command line, as `nsupdate -y` requires, but
// never appears in logs or `Debug` output.

mod dig;
mod nsupdate;

pub use dig::{DigRecordSource, DigSourceFactory, parse_short_answer};
pub use nsupdate::{NsupdateSink, NsupdateSinkFactory, update_script};

/// Register the nsupdate sink and the dig record source with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_nsupdate::register(&registry);
/// assert!(registry.has_update_sink("nsupdate"));
/// assert!(registry.has_record_source("dig"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_update_sink("nsupdate", Box::new(NsupdateSinkFactory));
    registry.register_record_source("dig", Box::new(DigSourceFactory));
}

/// Absolute (trailing-dot) form of a DNS name
pub(crate) fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

//! Interface allow/deny filter
//!
//! Patterns are evaluated in a fixed precedence, not in list order:
//!
//! 1. `lo` is always denied
//! 2. an exact `name` entry allows
//! 3. a `-name` entry denies
//! 4. a `*` entry allows everything else
//! 5. otherwise the device is denied

use serde::{Deserialize, Serialize};

/// Name of the loopback device, never eligible
pub const LOOPBACK_DEVICE: &str = "lo";

/// Wildcard pattern
pub const WILDCARD: &str = "*";

/// Ordered interface-name patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<FilterSpec>", into = "Vec<String>")]
pub struct AddressFilter {
    patterns: Vec<String>,
}

/// Accepted YAML shapes: a single pattern or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum FilterSpec {
    One(String),
    Many(Vec<String>),
}

impl From<Option<FilterSpec>> for AddressFilter {
    fn from(spec: Option<FilterSpec>) -> Self {
        match spec {
            Some(FilterSpec::One(pattern)) => Self::new(vec![pattern]),
            Some(FilterSpec::Many(patterns)) => Self::new(patterns),
            None => Self::default(),
        }
    }
}

impl From<AddressFilter> for Vec<String> {
    fn from(filter: AddressFilter) -> Self {
        filter.patterns
    }
}

impl AddressFilter {
    /// Create a filter; an empty list allows every device but `lo`.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.into().trim().to_string())
            .collect();
        if patterns.is_empty() {
            return Self::default();
        }
        Self { patterns }
    }

    /// Decide whether addresses on `device` may be considered.
    pub fn allow_device(&self, device: &str) -> bool {
        allow_device(self.patterns.as_slice(), device)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Reject patterns that can never match anything.
    pub fn validate(&self) -> crate::Result<()> {
        for pattern in &self.patterns {
            if pattern.is_empty() {
                return Err(crate::Error::config("Interface pattern cannot be empty"));
            }
            if pattern == "-" {
                return Err(crate::Error::config(
                    "Interface deny pattern '-' is missing a device name",
                ));
            }
        }
        Ok(())
    }
}

impl Default for AddressFilter {
    fn default() -> Self {
        Self {
            patterns: vec![WILDCARD.to_string()],
        }
    }
}

/// Free-standing form of [`AddressFilter::allow_device`].
pub fn allow_device<S: AsRef<str>>(patterns: &[S], device: &str) -> bool {
    if device == LOOPBACK_DEVICE {
        return false;
    }

    let has = |wanted: &str| patterns.iter().any(|p| p.as_ref() == wanted);

    if has(device) {
        true
    } else if has(&format!("-{}", device)) {
        false
    } else {
        has(WILDCARD)
    }
}

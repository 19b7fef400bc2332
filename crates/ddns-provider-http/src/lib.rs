// # HTTP Update Sink
//
// This crate delivers address updates to a dyndns-style HTTP endpoint.
//
// ## Protocol
//
// One `GET` per address:
//
// ```text
// GET <url>?myip=<address>&hostname=<hostname>
// Authorization: Basic ...            (when a username is configured)
// ```
//
// Only `200 OK` counts as accepted. The response body is logged and
// otherwise ignored.
//
// ## Trust Level: Untrusted (Update Sink)
//
// - One request per address, no retries, no backoff
// - No state between calls
// - The password never appears in logs or `Debug` output
//
// ## Dry-Run Mode
//
// With `dry_run: true` the sink logs the request it would send and reports
// success without contacting the endpoint.

use async_trait::async_trait;
use ddns_core::config::UpdateSinkConfig;
use ddns_core::traits::{UpdateSink, UpdateSinkFactory};
use ddns_core::{Error, Result};
use reqwest::{StatusCode, Url};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Default HTTP timeout for update requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const SINK_NAME: &str = "http";

/// dyndns HTTP update sink
pub struct HttpUpdateSink {
    /// Update endpoint, without query parameters for address and hostname
    url: String,

    /// Basic auth user name
    username: Option<String>,

    /// Basic auth password
    /// ⚠️ NEVER log this value
    password: Option<String>,

    client: reqwest::Client,

    dry_run: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for HttpUpdateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpdateSink")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl HttpUpdateSink {
    /// Create a new HTTP update sink
    ///
    /// # Parameters
    ///
    /// - `url`: Update endpoint (http or https)
    /// - `username`, `password`: Optional basic auth credentials
    /// - `dry_run`: Log requests instead of sending them
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If `url` does not parse
    /// - `Err(Error::Http)`: If the HTTP client cannot be built
    pub fn new(
        url: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let url = url.into();
        Url::parse(&url).map_err(|e| Error::config(format!("Invalid update URL {}: {}", url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            username,
            password,
            client,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn request_url(&self, hostname: &str, address: IpAddr) -> Result<Url> {
        let params = [
            ("myip", address.to_string()),
            ("hostname", hostname.to_string()),
        ];
        Url::parse_with_params(&self.url, &params)
            .map_err(|e| Error::config(format!("Invalid update URL {}: {}", self.url, e)))
    }

    async fn send(&self, hostname: &str, address: IpAddr) -> Result<()> {
        let url = self.request_url(hostname, address)?;

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send GET {}", url);
            return Ok(());
        }

        tracing::debug!("Sending GET {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if status == StatusCode::OK {
            tracing::info!("Update endpoint accepted {} for {}: {}", address, hostname, body.trim());
            return Ok(());
        }

        tracing::warn!("Update endpoint returned {} for {}: {}", status, address, body.trim());

        match status.as_u16() {
            401 | 403 => Err(Error::auth(format!(
                "Update endpoint rejected the credentials. Status: {}",
                status
            ))),
            404 => Err(Error::provider(
                SINK_NAME,
                format!("Update endpoint not found: {}", self.url),
            )),
            429 => Err(Error::provider(
                SINK_NAME,
                format!("Rate limit exceeded. Status: {}", status),
            )),
            500..=599 => Err(Error::provider(
                SINK_NAME,
                format!("Update endpoint server error (transient): {} - {}", status, body.trim()),
            )),
            _ => Err(Error::update_sink(format!(
                "Update rejected: {} - {}",
                status,
                body.trim()
            ))),
        }
    }
}

#[async_trait]
impl UpdateSink for HttpUpdateSink {
    async fn apply(
        &self,
        hostname: &str,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<()> {
        let addresses = ipv4
            .map(IpAddr::V4)
            .into_iter()
            .chain(ipv6.map(IpAddr::V6));

        for address in addresses {
            self.send(hostname, address).await?;
        }
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        SINK_NAME
    }
}

/// Factory for creating HTTP update sinks
pub struct HttpSinkFactory;

impl UpdateSinkFactory for HttpSinkFactory {
    fn create(&self, config: &UpdateSinkConfig) -> Result<Box<dyn UpdateSink>> {
        match config {
            UpdateSinkConfig::Http {
                url,
                username,
                password,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("HTTP update sink running in DRY-RUN mode - no changes will be made");
                }
                Ok(Box::new(HttpUpdateSink::new(
                    url.clone(),
                    username.clone(),
                    password.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for HTTP update sink")),
        }
    }
}

/// Register the HTTP update sink with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_http::register(&registry);
/// assert!(registry.has_update_sink("http"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_update_sink(SINK_NAME, Box::new(HttpSinkFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(server: &MockServer, username: Option<&str>, password: Option<&str>) -> HttpUpdateSink {
        HttpUpdateSink::new(
            format!("{}/nic/update", server.uri()),
            username.map(str::to_string),
            password.map(str::to_string),
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_sends_address_and_hostname() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nic/update"))
            .and(query_param("hostname", "host.example.org"))
            .and(query_param("myip", "85.207.1.2"))
            .and(header("authorization", "Basic aG9zdDpzM2NyZXQ="))
            .respond_with(ResponseTemplate::new(200).set_body_string("good 85.207.1.2"))
            .expect(1)
            .mount(&server)
            .await;

        let sink = sink(&server, Some("host"), Some("s3cret"));
        sink.apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_request_per_family() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nic/update"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let sink = sink(&server, None, None);
        sink.apply(
            "host.example.org",
            Some("85.207.1.2".parse().unwrap()),
            Some("2a01:4f8::1".parse().unwrap()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_ipv6_only_update() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("myip", "2a01:4f8::1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = sink(&server, None, None);
        sink.apply("host.example.org", None, Some("2a01:4f8::1".parse().unwrap()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("badauth"))
            .mount(&server)
            .await;

        let err = sink(&server, Some("host"), Some("wrong"))
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!err.to_string().contains("wrong"));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = sink(&server, None, None)
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_non_200_success_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = sink(&server, None, None)
            .apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await;
        assert!(matches!(result, Err(Error::UpdateSink(_))));
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sink = HttpUpdateSink::new(format!("{}/nic/update", server.uri()), None, None, true).unwrap();
        assert!(sink.is_dry_run());
        sink.apply("host.example.org", Some("85.207.1.2".parse().unwrap()), None)
            .await
            .unwrap();
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let sink = HttpUpdateSink::new(
            "https://ddns.example.org/update",
            Some("host".to_string()),
            Some("super_secret_password".to_string()),
            false,
        )
        .unwrap();

        let debug_output = format!("{:?}", sink);
        assert!(!debug_output.contains("super_secret_password"));
        assert!(debug_output.contains("<REDACTED>"));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = HttpUpdateSink::new("not a url", None, None, false);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        let config = UpdateSinkConfig::Nsupdate {
            server: "ns1.example.org".to_string(),
            zone: None,
            key: "hmac-sha256:ddns:c2VjcmV0".to_string(),
            ttl: 60,
            nsupdate_path: "nsupdate".to_string(),
        };
        assert!(HttpSinkFactory.create(&config).is_err());
    }

    #[test]
    fn test_register() {
        let registry = ddns_core::ProviderRegistry::new();
        register(&registry);

        let config = UpdateSinkConfig::Http {
            url: "https://ddns.example.org/update".to_string(),
            username: None,
            password: None,
            dry_run: true,
        };
        let sink = registry.create_update_sink(&config).unwrap();
        assert_eq!(sink.sink_name(), "http");
    }
}

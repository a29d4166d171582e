//! COS client and bucket handles

use super::attempt::AttemptStrategy;
use super::credentials::Credentials;
use super::error::CosError;
use super::region::{protocol, Region};
use crate::config::ClientConfig;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Service domain appended to derived hosts
pub const SERVICE_DOMAIN: &str = "myqcloud.com";

/// Derive the base URL for a bucket.
///
/// The override endpoint wins when present, otherwise the URL is
/// `<scheme>://<bucket>-<app_id>.<region>.myqcloud.com`.
pub fn derive_endpoint(
    region: &Region,
    app_id: &str,
    bucket: &str,
    secure: bool,
    endpoint_override: Option<&str>,
) -> String {
    match endpoint_override {
        Some(endpoint) => endpoint.to_string(),
        None => format!(
            "{}://{}",
            protocol(secure),
            derive_host(region, app_id, bucket)
        ),
    }
}

/// Derive the `Host` for a bucket: `<bucket>-<app_id>.<region>.myqcloud.com`
pub fn derive_host(region: &Region, app_id: &str, bucket: &str) -> String {
    format!("{}-{}.{}.{}", bucket, app_id, region, SERVICE_DOMAIN)
}

#[derive(Debug, Clone)]
struct ClientInner {
    app_id: String,
    credentials: Credentials,
    region: Region,
    secure: bool,
    connect_timeout: Option<Duration>,
    endpoint: Option<String>,
    host: Option<String>,
    debug: bool,
    strategy: AttemptStrategy,
    http: reqwest::Client,
}

/// COS client
///
/// Holds the identity and network settings. Cloning is cheap and clones share
/// one HTTP connection pool. The setters take `&mut self` and are meant to be
/// called before the client is shared.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a new client
    ///
    /// # Example
    ///
    /// ```
    /// use cos_client::cos::{Client, Region};
    ///
    /// let client = Client::new(Region::GUANGZHOU, "1250000000", "id", "key", true, false)?;
    /// let bucket = client.bucket("Charts");
    /// assert_eq!(bucket.name(), "charts");
    /// # Ok::<(), cos_client::cos::CosError>(())
    /// ```
    pub fn new(
        region: impl Into<Region>,
        app_id: impl Into<String>,
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        secure: bool,
        debug: bool,
    ) -> Result<Self, CosError> {
        Self::with_credentials(
            region,
            app_id,
            Credentials::new(secret_id, secret_key),
            secure,
            debug,
        )
    }

    /// Create a client from an existing credential pair
    pub fn with_credentials(
        region: impl Into<Region>,
        app_id: impl Into<String>,
        credentials: Credentials,
        secure: bool,
        debug: bool,
    ) -> Result<Self, CosError> {
        let inner = ClientInner {
            app_id: app_id.into(),
            credentials,
            region: region.into(),
            secure,
            connect_timeout: None,
            endpoint: None,
            host: None,
            debug,
            strategy: AttemptStrategy::default(),
            http: build_http_client(None)?,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, CosError> {
        let credentials = Credentials::from_config(config)?;
        let mut client = Self::with_credentials(
            config.region.clone(),
            config.app_id.clone(),
            credentials,
            config.secure,
            config.debug,
        )?
        .with_attempt_strategy(config.retry.strategy());

        if let Some(secs) = config.connect_timeout_secs {
            client = client.with_connect_timeout(Duration::from_secs(secs))?;
        }
        if let Some(endpoint) = &config.endpoint {
            client.set_endpoint(endpoint)?;
        }
        Ok(client)
    }

    /// Bound the time spent establishing connections
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, CosError> {
        let inner = Arc::make_mut(&mut self.inner);
        inner.http = build_http_client(Some(timeout))?;
        inner.connect_timeout = Some(timeout);
        Ok(self)
    }

    /// Replace the retry policy used by idempotent operations
    pub fn with_attempt_strategy(mut self, strategy: AttemptStrategy) -> Self {
        Arc::make_mut(&mut self.inner).strategy = strategy;
        self
    }

    /// Override the derived endpoint with a fixed host (`host[:port]`, no scheme).
    ///
    /// The scheme follows the client's `secure` flag. An empty host is ignored.
    pub fn set_endpoint(&mut self, host: &str) -> Result<(), CosError> {
        if host.is_empty() {
            return Ok(());
        }
        let link = format!("{}://{}", protocol(self.inner.secure), host);
        let url = Url::parse(&link).map_err(|e| CosError::InvalidEndpoint {
            endpoint: host.to_string(),
            reason: e.to_string(),
        })?;
        let hostname = url.host_str().ok_or_else(|| CosError::InvalidEndpoint {
            endpoint: host.to_string(),
            reason: "no host".into(),
        })?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname.to_string(),
        };

        let inner = Arc::make_mut(&mut self.inner);
        inner.host = Some(authority);
        inner.endpoint = Some(link);
        Ok(())
    }

    /// Toggle verbose request/response logging for this client
    pub fn set_debug(&mut self, debug: bool) {
        Arc::make_mut(&mut self.inner).debug = debug;
    }

    /// Handle for a bucket. The name is lower-cased.
    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket {
            client: self.clone(),
            name: name.to_lowercase(),
        }
    }

    /// Base URL for requests on `bucket`
    pub fn endpoint(&self, bucket: &str) -> String {
        derive_endpoint(
            &self.inner.region,
            &self.inner.app_id,
            bucket,
            self.inner.secure,
            self.inner.endpoint.as_deref(),
        )
    }

    /// `Host` header for requests on `bucket`
    pub fn host(&self, bucket: &str) -> String {
        match &self.inner.host {
            Some(host) => host.clone(),
            None => derive_host(&self.inner.region, &self.inner.app_id, bucket),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.inner.app_id
    }

    pub fn region(&self) -> &Region {
        &self.inner.region
    }

    pub fn is_secure(&self) -> bool {
        self.inner.secure
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.inner.connect_timeout
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn attempt_strategy(&self) -> AttemptStrategy {
        self.inner.strategy
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }
}

fn build_http_client(connect_timeout: Option<Duration>) -> Result<reqwest::Client, CosError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder.build().map_err(CosError::HttpClient)
}

/// Bucket handle: a client plus a lower-cased bucket name
#[derive(Debug, Clone)]
pub struct Bucket {
    client: Client,
    name: String,
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `/<bucket>/<key>` with exactly one slash before the key
    pub fn path(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("/{}{}", self.name, key)
        } else {
            format!("/{}/{}", self.name, key)
        }
    }
}

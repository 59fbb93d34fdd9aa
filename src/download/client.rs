//! HTTP client wrapper for probing and streaming downloads.
//!
//! [`ClientConfig`] is an immutable description of the client (timeouts,
//! User-Agent, gzip, TLS, proxy, cookies, redirects, extra headers). It is
//! turned into an [`HttpClient`] once and the client is then shared by the
//! prober and the transfer engine through the [`Transport`] trait.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RANGE,
};
use reqwest::{Certificate, Client, Method, Proxy, redirect};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, MAX_REDIRECTS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::transport::{
    BodyStream, ContentRange, RangeResponse, ResponseHead, Transport, range_header_value,
};
use crate::user_agent;

/// Proxy function: maps a request URL to the proxy to use, or `None` for a direct connection.
pub type ProxyFn = Arc<dyn Fn(&Url) -> Option<Url> + Send + Sync>;

/// How requests are proxied.
#[derive(Clone)]
pub enum ProxySetting {
    /// Never use a proxy, ignoring environment variables.
    Disabled,
    /// Send all traffic through this proxy URL.
    Url(String),
    /// Choose the proxy per request.
    Custom(ProxyFn),
}

impl fmt::Debug for ProxySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// TLS client options.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Extra PEM-encoded root certificates to trust.
    pub root_certificates_pem: Vec<Vec<u8>>,
    /// Skip certificate verification entirely.
    pub accept_invalid_certs: bool,
}

/// HTTP basic-auth credentials applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Optional password.
    pub password: Option<String>,
}

/// Immutable client configuration.
///
/// Built once with the `with_*` methods and handed to
/// [`HttpClient::from_config`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    user_agent: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    gzip: bool,
    cookies: bool,
    cookie_jar: Option<Arc<Jar>>,
    proxy: Option<ProxySetting>,
    tls: TlsOptions,
    max_redirects: usize,
    headers: Vec<(String, String)>,
    basic_auth: Option<BasicAuth>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: user_agent::default_user_agent(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            gzip: true,
            cookies: false,
            cookie_jar: None,
            proxy: None,
            tls: TlsOptions::default(),
            max_redirects: MAX_REDIRECTS,
            headers: Vec::new(),
            basic_auth: None,
        }
    }
}

impl ClientConfig {
    /// Sets the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the connect timeout and the per-read timeout.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Enables or disables transparent gzip decoding.
    #[must_use]
    pub fn with_gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Enables a fresh cookie store owned by the built client.
    #[must_use]
    pub fn with_cookies(mut self, enabled: bool) -> Self {
        self.cookies = enabled;
        self
    }

    /// Uses a caller-owned cookie store, shared with any other client given the same jar.
    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookies = true;
        self.cookie_jar = Some(jar);
        self
    }

    /// Sets the proxy behavior. Without this, reqwest's environment proxy lookup applies.
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxySetting) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets TLS options.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the redirect hop limit (`0` disables following redirects).
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    /// The configured User-Agent.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The configured connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The configured per-read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Whether gzip decoding is enabled.
    #[must_use]
    pub fn gzip(&self) -> bool {
        self.gzip
    }

    /// Whether a cookie store is attached.
    #[must_use]
    pub fn cookies(&self) -> bool {
        self.cookies
    }
}

/// HTTP client used for probing and transfers.
///
/// Create once and reuse; clones share the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    cookie_jar: Option<Arc<Jar>>,
    basic_auth: Option<BasicAuth>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client from [`ClientConfig::default`].
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration (TLS backend initialization failure).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
            .expect("failed to build HTTP client with default configuration")
    }

    /// Builds a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidConfig`] for unusable header names or
    /// values, proxy URLs, PEM certificates, or a client build failure.
    #[instrument(level = "debug", skip(config))]
    pub fn from_config(config: &ClientConfig) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .gzip(config.gzip)
            .user_agent(config.user_agent.clone())
            .default_headers(build_header_map(&config.headers)?)
            .redirect(redirect_policy(config.max_redirects));

        let cookie_jar = if config.cookies {
            let jar = config
                .cookie_jar
                .clone()
                .unwrap_or_else(|| Arc::new(Jar::default()));
            builder = builder.cookie_provider(Arc::clone(&jar));
            Some(jar)
        } else {
            None
        };

        match &config.proxy {
            None => {}
            Some(ProxySetting::Disabled) => builder = builder.no_proxy(),
            Some(ProxySetting::Url(proxy_url)) => {
                let proxy = Proxy::all(proxy_url.as_str()).map_err(|e| {
                    DownloadError::invalid_config(format!("proxy '{proxy_url}': {e}"))
                })?;
                builder = builder.proxy(proxy);
            }
            Some(ProxySetting::Custom(select)) => {
                let select = Arc::clone(select);
                builder = builder.proxy(Proxy::custom(move |url| select(url)));
            }
        }

        for pem in &config.tls.root_certificates_pem {
            let certificate = Certificate::from_pem(pem)
                .map_err(|e| DownloadError::invalid_config(format!("root certificate: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        if config.tls.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::invalid_config(format!("HTTP client: {e}")))?;
        debug!(
            cookies = cookie_jar.is_some(),
            gzip = config.gzip,
            "HTTP client ready"
        );
        Ok(Self {
            client,
            cookie_jar,
            basic_auth: config.basic_auth.clone(),
        })
    }

    /// The cookie jar attached to this client, if cookies are enabled.
    #[must_use]
    pub fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.cookie_jar.as_ref()
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn request(&self, method: Method, url: &Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url.clone());
        match &self.basic_auth {
            Some(auth) => request.basic_auth(&auth.username, auth.password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, url), fields(url = %url))]
    async fn head(&self, url: &Url) -> Result<ResponseHead, DownloadError> {
        let response = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        Ok(response_head(&response))
    }

    #[instrument(skip(self, url), fields(url = %url))]
    async fn get(
        &self,
        url: &Url,
        range_start: Option<u64>,
    ) -> Result<RangeResponse, DownloadError> {
        let mut request = self.request(Method::GET, url);
        if let Some(offset) = range_start {
            request = request.header(RANGE, range_header_value(offset));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        let head = response_head(&response);
        debug!(status = head.status, ?range_start, "response received");

        let url_text = url.to_string();
        let body: BodyStream = Box::pin(
            response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| DownloadError::from_reqwest(&url_text, e))),
        );
        Ok(RangeResponse { head, body })
    }
}

fn response_head(response: &reqwest::Response) -> ResponseHead {
    let header_text = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string)
    };
    let content_range = header_text(CONTENT_RANGE);
    ResponseHead {
        status: response.status().as_u16(),
        content_length: header_text(CONTENT_LENGTH),
        content_type: header_text(CONTENT_TYPE),
        content_range: content_range.as_deref().and_then(ContentRange::parse),
        unsatisfied_total: content_range
            .as_deref()
            .and_then(ContentRange::parse_unsatisfied),
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap, DownloadError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| DownloadError::invalid_config(format!("invalid header name '{name}'")))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            DownloadError::invalid_config(format!("invalid value for header '{name}'"))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn redirect_policy(max_redirects: usize) -> redirect::Policy {
    if max_redirects == 0 {
        redirect::Policy::none()
    } else {
        redirect::Policy::limited(max_redirects)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use futures_util::StreamExt;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn collect_body(mut body: BodyStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert!(config.gzip());
        assert!(!config.cookies());
        assert!(config.user_agent().starts_with("rangeload/"));
    }

    #[test]
    fn test_cookie_jar_enables_cookies() {
        let config = ClientConfig::default().with_cookie_jar(Arc::new(Jar::default()));
        assert!(config.cookies());
        let client = HttpClient::from_config(&config).unwrap();
        assert!(client.cookie_jar().is_some());
    }

    #[test]
    fn test_injected_cookie_jar_is_shared() {
        let jar = Arc::new(Jar::default());
        let config = ClientConfig::default().with_cookie_jar(Arc::clone(&jar));
        let client = HttpClient::from_config(&config).unwrap();
        assert!(Arc::ptr_eq(client.cookie_jar().unwrap(), &jar));
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        let config = ClientConfig::default().with_header("bad header", "x");
        let err = HttpClient::from_config(&config).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidConfig { .. }));
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let config = ClientConfig::default().with_header("X-Token", "line\nbreak");
        let err = HttpClient::from_config(&config).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidConfig { .. }));
    }

    #[test]
    fn test_invalid_root_certificate_is_config_error() {
        let config = ClientConfig::default().with_tls(TlsOptions {
            root_certificates_pem: vec![b"not a certificate".to_vec()],
            accept_invalid_certs: false,
        });
        assert!(HttpClient::from_config(&config).is_err());
    }

    #[test]
    fn test_connection_refused_is_error_not_response() {
        let client = HttpClient::new();
        let url = Url::parse("http://127.0.0.1:9/nothing").unwrap();
        let err = tokio_test::block_on(client.head(&url)).unwrap_err();
        assert!(
            matches!(
                err,
                DownloadError::Network { .. } | DownloadError::Timeout { .. }
            ),
            "expected transport failure, got: {err:?}"
        );
    }

    #[test]
    fn test_proxy_setting_debug_hides_function() {
        let custom = ProxySetting::Custom(Arc::new(|_url: &Url| None));
        assert_eq!(format!("{custom:?}"), "Custom(..)");
    }

    #[tokio::test]
    async fn test_head_returns_length_and_type() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/file.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Length", "1000")
                    .insert_header("Content-Type", "video/mp4"),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = Url::parse(&format!("{}/file.mp4", mock_server.uri())).unwrap();
        let head = client.head(&url).await.unwrap();

        assert_eq!(head.status, 200);
        assert_eq!(head.parsed_content_length(), Some(1000));
        assert_eq!(head.content_type.as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_get_without_offset_sends_no_range() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/plain.bin"))
            .and(header_exists("range"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/plain.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"whole body".to_vec()))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = Url::parse(&format!("{}/plain.bin", mock_server.uri())).unwrap();
        let response = client.get(&url, None).await.unwrap();

        assert_eq!(response.head.status, 200);
        assert_eq!(collect_body(response.body).await, b"whole body");
    }

    #[tokio::test]
    async fn test_get_with_offset_sends_range_header() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/ranged.bin"))
            .and(header("range", "bytes=4-"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 4-9/10")
                    .set_body_bytes(b"456789".to_vec()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = Url::parse(&format!("{}/ranged.bin", mock_server.uri())).unwrap();
        let response = client.get(&url, Some(4)).await.unwrap();

        assert_eq!(response.head.status, 206);
        assert_eq!(
            response.head.content_range,
            Some(ContentRange {
                start: 4,
                end: 9,
                total: Some(10)
            })
        );
        assert_eq!(collect_body(response.body).await, b"456789");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();
        let response = client.get(&url, None).await.unwrap();
        assert_eq!(response.head.status, 404);
        assert!(!response.head.is_success());
    }

    #[tokio::test]
    async fn test_configured_headers_and_user_agent_are_sent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/custom"))
            .and(header("user-agent", "custom-agent/1.0"))
            .and(header("x-token", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = ClientConfig::default()
            .with_user_agent("custom-agent/1.0")
            .with_header("X-Token", "secret");
        let client = HttpClient::from_config(&config).unwrap();
        let url = Url::parse(&format!("{}/custom", mock_server.uri())).unwrap();
        let head = client.head(&url).await.unwrap();
        assert_eq!(head.status, 200);
    }

    #[tokio::test]
    async fn test_basic_auth_is_applied() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        // "user:pass" base64-encoded
        Mock::given(method("HEAD"))
            .and(path("/private"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = ClientConfig::default().with_basic_auth("user", Some("pass".to_string()));
        let client = HttpClient::from_config(&config).unwrap();
        let url = Url::parse(&format!("{}/private", mock_server.uri())).unwrap();
        assert_eq!(client.head(&url).await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_redirects_disabled_returns_redirect_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/moved"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/target", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;

        let config = ClientConfig::default().with_max_redirects(0);
        let client = HttpClient::from_config(&config).unwrap();
        let url = Url::parse(&format!("{}/moved", mock_server.uri())).unwrap();
        assert_eq!(client.head(&url).await.unwrap().status, 302);
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        use std::io::Write;

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn mount_gzip_body(
        mock_server: &wiremock::MockServer,
        route: &str,
        compressed: Vec<u8>,
    ) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Encoding", "gzip")
                    .insert_header("Content-Type", "text/plain")
                    .set_body_bytes(compressed),
            )
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_gzip_body_is_decoded_onto_disk() {
        use crate::download::{NoProgress, RetryPolicy, Source, TransferEngine};

        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let plain = b"line of text that compresses well\n".repeat(64);
        mount_gzip_body(&mock_server, "/notes.txt", gzip(&plain)).await;

        let client = HttpClient::from_config(&ClientConfig::default()).unwrap();
        let source = Source {
            url: Url::parse(&format!("{}/notes.txt", mock_server.uri())).unwrap(),
            declared_size: Some(plain.len() as u64),
            extension: "txt".to_string(),
            content_type: Some("text/plain".to_string()),
        };
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");

        let outcome = TransferEngine::new(Arc::new(client), RetryPolicy::default())
            .transfer(&source, &file, &NoProgress)
            .await
            .unwrap();

        assert_eq!(outcome.total_bytes, plain.len() as u64);
        assert_eq!(std::fs::read(&file).unwrap(), plain);
    }

    #[tokio::test]
    async fn test_gzip_disabled_keeps_encoded_bytes() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let plain = b"line of text that compresses well\n".repeat(64);
        let compressed = gzip(&plain);
        mount_gzip_body(&mock_server, "/notes.txt", compressed.clone()).await;

        let client = HttpClient::from_config(&ClientConfig::default().with_gzip(false)).unwrap();
        let url = Url::parse(&format!("{}/notes.txt", mock_server.uri())).unwrap();
        let response = client.get(&url, None).await.unwrap();

        assert_eq!(response.head.status, 200);
        assert_eq!(collect_body(response.body).await, compressed);
    }

    #[tokio::test]
    async fn test_read_timeout_maps_to_timeout_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let config =
            ClientConfig::default().with_timeouts(Duration::from_secs(5), Duration::from_millis(300));
        let client = HttpClient::from_config(&config).unwrap();
        let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
        let err = client.head(&url).await.unwrap_err();
        assert!(
            matches!(err, DownloadError::Timeout { .. } | DownloadError::Network { .. }),
            "expected timeout, got: {err:?}"
        );
    }
}

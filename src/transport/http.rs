//! HTTP transport implementation over reqwest.

use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use reqwest::{Client, header};
use tracing::instrument;

use crate::{
    error::{GatewayError, Result},
    transport::{FormResponse, Transport, sealed},
};

/// Default HTTP client with connection pooling enabled.
///
/// Redirect following is disabled: the front-channel create flow must see
/// the `Location` header itself rather than chase it.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(10)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("default HTTP client configuration is valid")
});

/// Timeouts and pooling for [`HttpTransport::with_config`].
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Total request timeout in seconds.
    pub timeout_secs: u64,
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, connect_timeout_secs: 10, pool_max_idle_per_host: 10 }
    }
}

/// Form-POST transport using reqwest.
///
/// # Examples
///
/// ```
/// use unionpay_gateway::transport::{HttpConfig, HttpTransport};
///
/// let transport = HttpTransport::new();
/// let custom = HttpTransport::with_config(&HttpConfig {
///     timeout_secs: 60,
///     ..HttpConfig::default()
/// })
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates a transport sharing the pooled default client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: DEFAULT_HTTP_CLIENT.clone() }
    }

    /// Creates a transport with custom timeouts and pooling.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if client construction fails.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(GatewayError::Http)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, fields), fields(url, field_count = fields.len()))]
    async fn send_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a BTreeMap<String, String>,
        encoding: &'a str,
    ) -> Result<FormResponse> {
        if !encoding.eq_ignore_ascii_case("utf-8") {
            return Err(GatewayError::Config(format!(
                "transport only speaks UTF-8, configured encoding is {encoding}"
            )));
        }

        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        let response = self
            .client
            .post(url)
            .header(
                header::CONTENT_TYPE,
                format!("application/x-www-form-urlencoded;charset={encoding}"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        // Decoded per the charset the response declares; UTF-8 otherwise.
        let body = response.text().await?;

        Ok(FormResponse { status, body, location })
    }
}

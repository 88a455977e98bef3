//! Shared HTTP client for site requests.
//!
//! Wraps a configured [`reqwest::Client`] with a cookie jar seeded from the
//! user's configuration (standing in for the browser's signed-in session),
//! a browser-like User-Agent, and a cookieless twin used for APIs that
//! reject credentialed requests.
//!
//! [`HttpClient::request`] never retries and never turns a non-2xx status
//! into an error: callers inspect [`ResponseHandle::status`] or call
//! [`ResponseHandle::ensure_success`], then check the application-level
//! success field of the body themselves.

use crate::config::ClientConfig;
use crate::error::{Result, SiteError};
use rand::seq::SliceRandom;
use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Realistic browser User-Agent strings, one picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Whether a request carries the site's cookies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Send cookies from the shared jar.
    #[default]
    Include,
    /// Send the request without any cookies.
    Omit,
}

/// A request body. Its presence makes the request a POST.
///
/// Serialisation is the caller's responsibility: a [`RequestBody::Form`]
/// string is sent verbatim.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// A pre-encoded `application/x-www-form-urlencoded` string.
    Form(String),
    /// Form fields, encoded by the client.
    FormPairs(Vec<(String, String)>),
    /// A JSON document.
    Json(serde_json::Value),
    /// An empty `multipart/form-data` body.
    EmptyMultipart,
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    credentials: Credentials,
}

impl RequestOptions {
    /// Options with no extra headers and cookies included.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the `Referer` header.
    pub fn referrer(self, url: impl Into<String>) -> Self {
        self.header("Referer", url)
    }

    /// Send the request without cookies.
    pub fn omit_credentials(mut self) -> Self {
        self.credentials = Credentials::Omit;
        self
    }

    /// The credential mode of these options.
    pub fn credentials(&self) -> Credentials {
        self.credentials
    }
}

/// Shared HTTP client used by every site strategy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    credentialed: reqwest::Client,
    anonymous: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpClient {
    /// Build a client pair (credentialed and anonymous) from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] if the config is invalid or the
    /// underlying clients cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let ua = match config.user_agent {
            Some(ref custom) => custom.clone(),
            None => random_user_agent().to_owned(),
        };
        let timeout = Duration::from_secs(config.timeout_seconds);
        let jar = Arc::new(Jar::default());

        let credentialed = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .user_agent(ua.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SiteError::Config(format!("failed to build HTTP client: {e}")))?;

        let anonymous = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(ua)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SiteError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credentialed,
            anonymous,
            jar,
        })
    }

    /// Seed the cookie jar with a `name=value; name2=value2` cookie string
    /// copied from a signed-in browser session for `site_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] if `site_url` is not an absolute URL.
    pub fn add_cookies(&self, site_url: &str, cookie: &str) -> Result<()> {
        let url = Url::parse(site_url)
            .map_err(|e| SiteError::Config(format!("invalid site URL '{site_url}': {e}")))?;
        let mut added = 0usize;
        for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(pair, &url);
            added += 1;
        }
        tracing::debug!(host = url.host_str().unwrap_or_default(), added, "seeded cookies");
        Ok(())
    }

    /// Issue a request. A body makes it a POST, otherwise it is a GET.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Network`] on transport failure only. Non-2xx
    /// responses are returned as a handle for the caller to inspect.
    pub async fn request(
        &self,
        url: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> Result<ResponseHandle> {
        let client = match options.credentials {
            Credentials::Include => &self.credentialed,
            Credentials::Omit => &self.anonymous,
        };

        let mut builder = match body {
            None => client.get(url),
            Some(RequestBody::Form(encoded)) => client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(encoded),
            Some(RequestBody::FormPairs(pairs)) => client.post(url).form(&pairs),
            Some(RequestBody::Json(value)) => client.post(url).json(&value),
            Some(RequestBody::EmptyMultipart) => client
                .post(url)
                .multipart(reqwest::multipart::Form::new()),
        };
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::trace!(url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| SiteError::Network(format!("request to {url} failed: {e}")))?;

        Ok(ResponseHandle::new(response))
    }

    /// Convenience GET with default options.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::request`].
    pub async fn get(&self, url: &str) -> Result<ResponseHandle> {
        self.request(url, None, &RequestOptions::default()).await
    }
}

/// A received response whose body has not been read yet.
///
/// The body can be decoded exactly once: [`ResponseHandle::text`] and
/// [`ResponseHandle::json`] consume the handle.
#[derive(Debug)]
pub struct ResponseHandle {
    status: u16,
    url: String,
    inner: reqwest::Response,
}

impl ResponseHandle {
    fn new(inner: reqwest::Response) -> Self {
        Self {
            status: inner.status().as_u16(),
            url: inner.url().to_string(),
            inner,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Turn a non-2xx response into [`SiteError::Status`], reading the body
    /// for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Status`] for non-2xx responses.
    pub async fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let body = self.inner.text().await.unwrap_or_default();
        Err(SiteError::Status { status, body })
    }

    /// Read the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Network`] if the body cannot be read.
    pub async fn text(self) -> Result<String> {
        let url = self.url;
        self.inner
            .text()
            .await
            .map_err(|e| SiteError::Network(format!("reading body of {url} failed: {e}")))
    }

    /// Read the body and decode it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Network`] if the body cannot be read, or
    /// [`SiteError::Decode`] if it is not the expected JSON shape.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let url = self.url.clone();
        let text = self.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| SiteError::Decode(format!("invalid JSON from {url}: {e}")))
    }
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

use std::time::Duration;

use url::Url;

/// Error during fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub message: String,
    /// HTTP status when the server answered with a failure
    pub status: Option<u16>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FetchError {}

/// Text fetch capability consumed by the viewer. Implementations are called
/// from a background thread.
pub trait Fetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Join a possibly relative `href` onto `base_url`. Absolute URLs and
/// `file://` locators pass through unchanged.
pub fn resolve_href(base_url: Option<&str>, href: &str) -> Result<String, FetchError> {
    if Url::parse(href).is_ok() {
        return Ok(href.to_string());
    }
    let Some(base) = base_url else {
        return Ok(href.to_string());
    };
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let base = Url::parse(&base).map_err(|e| FetchError::new(format!("Invalid base URL: {e}")))?;
    base.join(href.trim_start_matches('/'))
        .map(|u| u.to_string())
        .map_err(|e| FetchError::new(format!("Invalid URL: {e}")))
}

// ── HTTP ──

/// Blocking HTTP(S) client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("morpho-viewer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::new(format!("Client error: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::new(format!("Invalid URL: {e}")))?;

        let response = self
            .client
            .get(parsed.as_str())
            .header("Accept", "text/plain,*/*;q=0.8")
            .send()
            .map_err(|e| FetchError::new(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError {
                message: format!("Failed to load {url}"),
                status: Some(status.as_u16()),
            });
        }

        response
            .text()
            .map_err(|e| FetchError::new(format!("Failed to read body: {e}")))
    }
}

// ── Local files ──

/// Reads `file://` URLs and plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let path = match Url::parse(url) {
            Ok(u) if u.scheme() == "file" => u
                .to_file_path()
                .map_err(|_| FetchError::new(format!("Not a local path: {url}")))?,
            // Single-letter schemes are Windows drive letters.
            Ok(u) if u.scheme().len() > 1 => {
                return Err(FetchError::new(format!(
                    "Unsupported scheme '{}' for local files",
                    u.scheme()
                )))
            }
            _ => url.into(),
        };
        std::fs::read_to_string(&path)
            .map_err(|e| FetchError::new(format!("Failed to read {}: {e}", path.display())))
    }
}

// ── Dispatch ──

/// HTTP(S) URLs go to the network, everything else to the file system.
pub struct DefaultFetcher {
    http: Option<HttpFetcher>,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        let http = match HttpFetcher::new() {
            Ok(http) => Some(http),
            Err(e) => {
                log::warn!("HTTP fetching disabled: {e}");
                None
            }
        };
        Self {
            http,
            file: FileFetcher,
        }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            match &self.http {
                Some(http) => http.fetch_text(url),
                None => Err(FetchError::new("HTTP client unavailable")),
            }
        } else {
            self.file.fetch_text(url)
        }
    }
}

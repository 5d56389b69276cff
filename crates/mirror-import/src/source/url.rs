//! Generic HTTP(S) directory tree source
//!
//! Directories are read from the HTML index pages web servers generate
//! (Apache `mod_autoindex`, nginx `autoindex`, ...). Only links that point to
//! a direct child of the listed directory on the same host become entries.

use super::{FetchedFile, Source};
use crate::error::{ConfigError, ListEntriesError, SourceError};
use crate::file::{FileSpec, FileState};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct UrlSource {
    url: String,
    base: Option<Url>,
    client: Option<Client>,
}

impl UrlSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            base: None,
            client: None,
        }
    }

    /// Configured root URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<&Client, SourceError> {
        self.client.as_ref().ok_or(SourceError::NotConnected)
    }

    /// Absolute URL of `path` below the root
    pub(crate) fn resolve(&self, path: &str) -> Result<Url, SourceError> {
        let base = self.base.as_ref().ok_or(SourceError::NotConnected)?;
        // "./" keeps paths like "a:b" from being read as a scheme
        base.join(&format!("./{path}")).map_err(|e| SourceError::InvalidUrl {
            url: format!("{base}{path}"),
            message: e.to_string(),
        })
    }

    /// Best-effort display form of `path`'s URL for error reports
    pub(crate) fn location(&self, path: &str) -> String {
        self.resolve(path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.url, path))
    }

    /// GET a document below the root, failing on any non-success status
    pub(crate) async fn fetch_document(&self, path: &str) -> Result<Vec<u8>, ListEntriesError> {
        let location = self.location(path);
        let url = self.resolve(path).map_err(|e| ListEntriesError::new(&location, e))?;
        let client = self.client().map_err(|e| ListEntriesError::new(&location, e))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ListEntriesError::new(&location, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ListEntriesError::new(
                &location,
                format!("unexpected status {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ListEntriesError::new(&location, format!("could not read body: {e}")))?;

        debug!(url = %location, bytes = body.len(), "Fetched document");
        Ok(body.to_vec())
    }
}

/// Fingerprint from response headers
///
/// `Content-Length` is read from the raw header because the body length of a
/// `HEAD` response is always zero.
pub(crate) fn state_from_headers(headers: &HeaderMap) -> FileState {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    FileState {
        size_bytes: text(header::CONTENT_LENGTH).and_then(|len| len.trim().parse().ok()),
        etag: text(header::ETAG),
        last_modified: text(header::LAST_MODIFIED),
        checksum: None,
        content_type: text(header::CONTENT_TYPE),
    }
}

/// Extract the direct children of `directory` from an HTML index page
pub(crate) fn parse_listing(
    page_url: &Url,
    directory: &str,
    html: &str,
) -> Result<Vec<FileSpec>, ListEntriesError> {
    let selector = Selector::parse("a[href]")
        .map_err(|e| ListEntriesError::new(page_url.as_str(), format!("invalid selector: {e}")))?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(target) = page_url.join(href) else {
            continue;
        };
        if target.query().is_some() || target.fragment().is_some() {
            continue;
        }
        if target.scheme() != page_url.scheme()
            || target.host_str() != page_url.host_str()
            || target.port_or_known_default() != page_url.port_or_known_default()
        {
            continue;
        }

        let Some(name) = target.path().strip_prefix(page_url.path()) else {
            continue;
        };
        let is_directory = name.ends_with('/');
        let bare = name.trim_end_matches('/');
        if bare.is_empty() || bare.contains('/') || bare == "." || bare == ".." {
            continue;
        }

        let path = format!("{directory}{name}");
        if !seen.insert(path.clone()) {
            continue;
        }

        entries.push(if is_directory {
            FileSpec::directory(path)
        } else {
            FileSpec::file(path)
        });
    }

    Ok(entries)
}

#[async_trait]
impl Source for UrlSource {
    fn validate(&self, name: &str) -> Vec<ConfigError> {
        if self.url.trim().is_empty() {
            return vec![ConfigError::new(name, "from.url", "is missing")];
        }
        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Vec::new(),
            Ok(url) => vec![ConfigError::new(
                name,
                "from.url",
                format!("unsupported scheme {:?}", url.scheme()),
            )],
            Err(e) => vec![ConfigError::new(name, "from.url", format!("is not a valid URL: {e}"))],
        }
    }

    fn set_http_client(&mut self, client: Client) {
        self.client = Some(client);
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        let mut base = Url::parse(&self.url).map_err(|e| SourceError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        if self.client.is_none() {
            let client = Client::builder()
                .build()
                .map_err(|source| SourceError::Request {
                    url: self.url.clone(),
                    source,
                })?;
            self.client = Some(client);
        }

        debug!(url = %base, "Connected URL source");
        self.base = Some(base);
        Ok(())
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn list_entries(&self, directory: &str) -> Result<Vec<FileSpec>, ListEntriesError> {
        let page_url = self
            .resolve(directory)
            .map_err(|e| ListEntriesError::new(self.location(directory), e))?;
        let body = self.fetch_document(directory).await?;
        let html = String::from_utf8_lossy(&body);

        let entries = parse_listing(&page_url, directory, &html)?;
        debug!(entries = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn probe_file(&self, path: &str) -> Result<FileState, SourceError> {
        let url = self.resolve(path)?;
        let response = self
            .client()?
            .head(url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(SourceError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(state_from_headers(response.headers()))
    }

    async fn get_file(&self, path: &str, previous: &FileState) -> Result<FetchedFile, SourceError> {
        let url = self.resolve(path)?;
        let mut request = self.client()?.get(url.clone());
        if let Some(ref etag) = previous.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(ref last_modified) = previous.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await.map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchedFile {
                body: None,
                state: previous.clone(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut state = state_from_headers(response.headers());
        let body = response.bytes().await.map_err(|source| SourceError::Body {
            url: url.to_string(),
            source,
        })?;
        if state.size_bytes.is_none() {
            state.size_bytes = Some(body.len() as u64);
        }

        Ok(FetchedFile {
            body: Some(body.to_vec()),
            state,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const AUTOINDEX: &str = r#"<html><head><title>Index of /pub/</title></head><body>
<h1>Index of /pub/</h1>
<table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th></tr>
<tr><td><a href="/">Parent Directory</a></td></tr>
<tr><td><a href="../">../</a></td></tr>
<tr><td><a href="centos/">centos/</a></td></tr>
<tr><td><a href="README.txt">README.txt</a></td></tr>
<tr><td><a href="README.txt">README.txt</a></td></tr>
<tr><td><a href="README.txt#top">README.txt</a></td></tr>
<tr><td><a href="https://other.example/pub/evil.txt">evil.txt</a></td></tr>
<tr><td><a href="centos/7/os/">deep link</a></td></tr>
<tr><td><a href="/pub/absolute.iso">absolute.iso</a></td></tr>
</table></body></html>"#;

    #[test]
    fn test_parse_listing_keeps_direct_children_only() {
        let page = Url::parse("https://mirror.example/pub/").unwrap();
        let entries = parse_listing(&page, "", AUTOINDEX).unwrap();

        assert_eq!(
            entries,
            vec![
                FileSpec::directory("centos/"),
                FileSpec::file("README.txt"),
                FileSpec::file("absolute.iso"),
            ]
        );
    }

    #[test]
    fn test_parse_listing_prefixes_directory() {
        let page = Url::parse("http://mirror.example:8080/pub/centos/").unwrap();
        let html = r#"<a href="7/">7/</a><a href="http://mirror.example/pub/centos/8/">other port</a>"#;
        let entries = parse_listing(&page, "centos/", html).unwrap();
        assert_eq!(entries, vec![FileSpec::directory("centos/7/")]);
    }

    #[test]
    fn test_state_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1234"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"4d2-5f\""));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let state = state_from_headers(&headers);
        assert_eq!(state.size_bytes, Some(1234));
        assert_eq!(state.etag.as_deref(), Some("\"4d2-5f\""));
        assert_eq!(state.last_modified, None);
        assert_eq!(state.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(UrlSource::new("https://mirror.example/").validate("jobs[0]").is_empty());
        assert_eq!(UrlSource::new("").validate("jobs[0]")[0].message, "is missing");
        assert_eq!(UrlSource::new("ftp://mirror.example/").validate("jobs[0]").len(), 1);
        assert_eq!(UrlSource::new("not a url").validate("jobs[0]").len(), 1);
    }

    #[tokio::test]
    async fn test_connect_appends_trailing_slash() {
        let mut source = UrlSource::new("https://mirror.example/pub");
        source.connect().await.unwrap();
        assert_eq!(
            source.resolve("centos/7/").unwrap().as_str(),
            "https://mirror.example/pub/centos/7/"
        );
        assert_eq!(
            source.resolve("a:b.txt").unwrap().as_str(),
            "https://mirror.example/pub/a:b.txt"
        );
    }

    #[test]
    fn test_unconnected_source_refuses_requests() {
        let source = UrlSource::new("https://mirror.example/pub/");
        assert!(matches!(source.resolve("a.txt"), Err(SourceError::NotConnected)));
        assert_eq!(source.location("a.txt"), "https://mirror.example/pub/a.txt");
    }
}

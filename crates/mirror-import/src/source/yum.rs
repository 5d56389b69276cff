//! Yum repository source
//!
//! Enumeration follows the repository metadata instead of HTML listings:
//!
//! 1. `repodata/repomd.xml` names every metadata file by type
//! 2. the `primary` metadata lists every package
//! 3. the optional `prestodelta` metadata lists delta packages
//!
//! Every other capability is delegated to the wrapped [`UrlSource`].

use super::{FetchedFile, Source, UrlSource};
use crate::error::{ConfigError, ListEntriesError, SourceError};
use crate::file::{FileSpec, FileState};
use async_trait::async_trait;
use mirror_common::checksum::Checksum;
use mirror_common::decompression::decode_document;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

const REPOMD_PATH: &str = "repodata/repomd.xml";

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Deserialize)]
struct ChecksumElement {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl ChecksumElement {
    fn to_checksum(&self) -> Option<Checksum> {
        (!self.kind.is_empty() && !self.value.trim().is_empty())
            .then(|| Checksum::new(&self.kind, &self.value))
    }
}

#[derive(Debug, Deserialize)]
struct Repomd {
    #[serde(default)]
    data: Vec<RepomdData>,
}

#[derive(Debug, Deserialize)]
struct RepomdData {
    #[serde(rename = "@type")]
    kind: String,
    location: Location,
    checksum: Option<ChecksumElement>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Primary {
    #[serde(rename = "package", default)]
    packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    location: Location,
    checksum: Option<ChecksumElement>,
    size: Option<PackageSize>,
}

#[derive(Debug, Deserialize)]
struct PackageSize {
    #[serde(rename = "@package")]
    package: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Prestodelta {
    #[serde(rename = "newpackage", default)]
    packages: Vec<NewPackage>,
}

#[derive(Debug, Deserialize)]
struct NewPackage {
    #[serde(rename = "delta", default)]
    deltas: Vec<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    filename: String,
    checksum: Option<ChecksumElement>,
    size: Option<u64>,
}

fn hinted(path: &str, size_bytes: Option<u64>, checksum: Option<&ChecksumElement>) -> FileSpec {
    FileSpec::file(path).with_hint(FileState {
        size_bytes,
        checksum: checksum.and_then(ChecksumElement::to_checksum),
        ..FileState::default()
    })
}

#[derive(Debug, Clone)]
pub struct YumSource {
    inner: UrlSource,
}

impl YumSource {
    pub fn new(inner: UrlSource) -> Self {
        Self { inner }
    }

    /// Fetch `path`, gunzip it if needed, and parse it as XML
    async fn fetch_xml<T: DeserializeOwned>(&self, path: &str) -> Result<T, ListEntriesError> {
        let location = self.inner.location(path);
        let raw = self.inner.fetch_document(path).await?;
        let document = decode_document(&raw).map_err(|e| ListEntriesError::new(&location, e))?;
        let text = std::str::from_utf8(&document)
            .map_err(|e| ListEntriesError::new(&location, format!("document is not UTF-8: {e}")))?;
        quick_xml::de::from_str(text)
            .map_err(|e| ListEntriesError::new(&location, format!("could not parse XML: {e}")))
    }
}

#[async_trait]
impl Source for YumSource {
    fn validate(&self, name: &str) -> Vec<ConfigError> {
        self.inner.validate(name)
    }

    fn set_http_client(&mut self, client: reqwest::Client) {
        self.inner.set_http_client(client);
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        self.inner.connect().await
    }

    fn supports_directory_listing(&self) -> bool {
        false
    }

    async fn list_entries(&self, directory: &str) -> Result<Vec<FileSpec>, ListEntriesError> {
        Err(ListEntriesError::not_implemented(self.inner.location(directory)))
    }

    async fn probe_file(&self, path: &str) -> Result<FileState, SourceError> {
        self.inner.probe_file(path).await
    }

    async fn get_file(&self, path: &str, previous: &FileState) -> Result<FetchedFile, SourceError> {
        self.inner.get_file(path, previous).await
    }

    #[instrument(skip(self), fields(url = %self.inner.url()))]
    async fn list_all_files(&self) -> Result<Vec<FileSpec>, ListEntriesError> {
        let repomd: Repomd = self.fetch_xml(REPOMD_PATH).await?;

        let mut files = vec![FileSpec::file(REPOMD_PATH)];
        let mut by_type = HashMap::new();
        for data in &repomd.data {
            files.push(hinted(&data.location.href, data.size, data.checksum.as_ref()));
            by_type.insert(data.kind.as_str(), data.location.href.as_str());
        }

        let primary_href = by_type.get("primary").ok_or_else(|| {
            ListEntriesError::new(
                self.inner.location(REPOMD_PATH),
                "no metadata of type \"primary\" is listed",
            )
        })?;
        let primary: Primary = self.fetch_xml(primary_href).await?;
        let package_count = primary.packages.len();
        files.extend(primary.packages.iter().map(|package| {
            hinted(
                &package.location.href,
                package.size.as_ref().and_then(|size| size.package),
                package.checksum.as_ref(),
            )
        }));

        let mut delta_count = 0;
        match by_type.get("prestodelta") {
            Some(href) => {
                let prestodelta: Prestodelta = self.fetch_xml(href).await?;
                for delta in prestodelta.packages.iter().flat_map(|p| p.deltas.iter()) {
                    files.push(hinted(&delta.filename, delta.size, delta.checksum.as_ref()));
                    delta_count += 1;
                }
            },
            None => debug!("Repository has no delta packages"),
        }

        info!(
            metadata = repomd.data.len(),
            packages = package_count,
            deltas = delta_count,
            "Enumerated Yum repository"
        );
        Ok(files)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1729000000</revision>
  <data type="primary">
    <checksum type="sha256">AAAA</checksum>
    <open-checksum type="sha256">bbbb</open-checksum>
    <location href="repodata/aaaa-primary.xml.gz"/>
    <timestamp>1729000000</timestamp>
    <size>1412</size>
    <open-size>9000</open-size>
  </data>
  <data type="filelists">
    <location href="repodata/cccc-filelists.xml.gz"/>
  </data>
</repomd>"#;

    const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
<package type="rpm">
  <name>bash</name>
  <arch>x86_64</arch>
  <checksum type="sha256" pkgid="YES">dddd</checksum>
  <size package="1500000" installed="6000000" archive="6100000"/>
  <location href="Packages/bash-5.1-1.x86_64.rpm"/>
  <format><rpm:license>GPLv3+</rpm:license></format>
</package>
<package type="rpm">
  <name>zsh</name>
  <location href="Packages/zsh-5.8-1.x86_64.rpm"/>
</package>
</metadata>"#;

    const PRESTODELTA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<prestodelta>
  <newpackage name="bash" epoch="0" version="5.1" release="1" arch="x86_64">
    <delta oldepoch="0" oldversion="5.0" oldrelease="1">
      <filename>drpms/bash-5.0-1_5.1-1.x86_64.drpm</filename>
      <sequence>bash-5.0-1-abc</sequence>
      <size>20480</size>
      <checksum type="sha256">eeee</checksum>
    </delta>
    <delta oldepoch="0" oldversion="4.4" oldrelease="2">
      <filename>drpms/bash-4.4-2_5.1-1.x86_64.drpm</filename>
    </delta>
  </newpackage>
</prestodelta>"#;

    #[test]
    fn test_parse_repomd() {
        let repomd: Repomd = quick_xml::de::from_str(REPOMD).unwrap();
        assert_eq!(repomd.data.len(), 2);

        let primary = &repomd.data[0];
        assert_eq!(primary.kind, "primary");
        assert_eq!(primary.location.href, "repodata/aaaa-primary.xml.gz");
        assert_eq!(primary.size, Some(1412));

        let spec = hinted(&primary.location.href, primary.size, primary.checksum.as_ref());
        let hint = spec.hint.unwrap();
        assert_eq!(hint.checksum.unwrap().to_string(), "sha256:aaaa");

        assert!(repomd.data[1].checksum.is_none());
    }

    #[test]
    fn test_parse_primary() {
        let primary: Primary = quick_xml::de::from_str(PRIMARY).unwrap();
        let hrefs: Vec<_> = primary.packages.iter().map(|p| p.location.href.as_str()).collect();
        assert_eq!(hrefs, vec!["Packages/bash-5.1-1.x86_64.rpm", "Packages/zsh-5.8-1.x86_64.rpm"]);
        assert_eq!(primary.packages[0].size.as_ref().unwrap().package, Some(1_500_000));
        assert!(primary.packages[1].size.is_none());
    }

    #[test]
    fn test_parse_prestodelta() {
        let prestodelta: Prestodelta = quick_xml::de::from_str(PRESTODELTA).unwrap();
        let deltas: Vec<_> = prestodelta.packages.iter().flat_map(|p| p.deltas.iter()).collect();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].filename, "drpms/bash-5.0-1_5.1-1.x86_64.drpm");
        assert_eq!(deltas[0].size, Some(20480));
        assert!(deltas[1].checksum.is_none());
    }

    #[tokio::test]
    async fn test_directory_listing_is_not_implemented() {
        let source = YumSource::new(UrlSource::new("https://mirror.example/centos/"));
        assert!(!source.supports_directory_listing());

        let err = source.list_entries("").await.unwrap_err();
        assert_eq!(err.location, "https://mirror.example/centos/");
        assert!(err.message.contains("not implemented"));
    }
}

//! Yum repository enumeration against a mock mirror

use flate2::write::GzEncoder;
use flate2::Compression;
use mirror_import::source::{Source, UrlSource, YumSource};
use std::io::Write;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn gzip(data: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn repomd(entries: &[(&str, &str)]) -> String {
    let data: String = entries
        .iter()
        .map(|(kind, href)| {
            format!(
                "  <data type=\"{kind}\">\n    <checksum type=\"sha256\">0123abcd</checksum>\n    \
                 <location href=\"{href}\"/>\n    <size>321</size>\n  </data>\n"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <repomd xmlns=\"http://linux.duke.edu/metadata/repo\">\n  <revision>1729000000</revision>\n{data}</repomd>\n"
    )
}

fn primary(hrefs: &[&str]) -> String {
    let packages: String = hrefs
        .iter()
        .map(|href| {
            format!(
                "<package type=\"rpm\"><name>pkg</name><checksum type=\"sha256\" pkgid=\"YES\">feed</checksum>\
                 <size package=\"42\" installed=\"100\" archive=\"120\"/><location href=\"{href}\"/></package>\n"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <metadata xmlns=\"http://linux.duke.edu/metadata/common\" packages=\"{}\">\n{packages}</metadata>\n",
        hrefs.len()
    )
}

const PRESTODELTA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<prestodelta>
  <newpackage name="pkg" epoch="0" version="1.1" release="1" arch="x86_64">
    <delta oldepoch="0" oldversion="1.0" oldrelease="1">
      <filename>drpms/pkg-1.0-1_1.1-1.x86_64.drpm</filename>
      <sequence>pkg-1.0-1-0123</sequence>
      <size>2048</size>
      <checksum type="sha256">beef</checksum>
    </delta>
  </newpackage>
</prestodelta>
"#;

async fn serve(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn connected(server: &MockServer) -> YumSource {
    let mut source = YumSource::new(UrlSource::new(format!("{}/repo/", server.uri())));
    source.connect().await.unwrap();
    source
}

async fn listed_paths(source: &YumSource) -> Vec<String> {
    source
        .list_all_files()
        .await
        .unwrap()
        .into_iter()
        .map(|spec| spec.path)
        .collect()
}

#[tokio::test]
async fn test_gzipped_primary_without_deltas() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/repo/repodata/repomd.xml",
        repomd(&[("primary", "repodata/primary.xml.gz")]).into_bytes(),
    )
    .await;
    serve(&server, "/repo/repodata/primary.xml.gz", gzip(&primary(&["pkg-1.0.rpm"]))).await;

    let source = connected(&server).await;
    let mut paths = listed_paths(&source).await;
    paths.sort();

    assert_eq!(paths, vec!["pkg-1.0.rpm", "repodata/primary.xml.gz", "repodata/repomd.xml"]);
}

#[tokio::test]
async fn test_every_metadata_package_and_delta_is_listed() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/repo/repodata/repomd.xml",
        repomd(&[
            ("primary", "repodata/aa-primary.xml"),
            ("filelists", "repodata/bb-filelists.xml.gz"),
            ("prestodelta", "repodata/cc-prestodelta.xml.gz"),
        ])
        .into_bytes(),
    )
    .await;
    serve(
        &server,
        "/repo/repodata/aa-primary.xml",
        primary(&["Packages/a-1.0.rpm", "Packages/b-2.0.rpm", "Packages/a-1.0.rpm"]).into_bytes(),
    )
    .await;
    serve(&server, "/repo/repodata/cc-prestodelta.xml.gz", gzip(PRESTODELTA)).await;

    let source = connected(&server).await;
    let files = source.list_all_files().await.unwrap();
    let paths: Vec<_> = files.iter().map(|spec| spec.path.as_str()).collect();

    assert_eq!(
        paths,
        vec![
            "repodata/repomd.xml",
            "repodata/aa-primary.xml",
            "repodata/bb-filelists.xml.gz",
            "repodata/cc-prestodelta.xml.gz",
            "Packages/a-1.0.rpm",
            "Packages/b-2.0.rpm",
            "Packages/a-1.0.rpm",
            "drpms/pkg-1.0-1_1.1-1.x86_64.drpm",
        ]
    );

    // repomd.xml itself has no hint; everything it lists does
    assert!(files[0].hint.is_none());
    let package = files[4].hint.as_ref().unwrap();
    assert_eq!(package.size_bytes, Some(42));
    assert_eq!(package.checksum.as_ref().unwrap().to_string(), "sha256:feed");
    let delta = files[7].hint.as_ref().unwrap();
    assert_eq!(delta.size_bytes, Some(2048));
}

#[tokio::test]
async fn test_missing_primary_references_repomd() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/repo/repodata/repomd.xml",
        repomd(&[("filelists", "repodata/filelists.xml.gz")]).into_bytes(),
    )
    .await;

    let source = connected(&server).await;
    let err = source.list_all_files().await.unwrap_err();

    assert_eq!(err.location, format!("{}/repo/repodata/repomd.xml", server.uri()));
    assert!(err.message.contains("primary"));
}

#[tokio::test]
async fn test_unreachable_primary_references_its_own_url() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/repo/repodata/repomd.xml",
        repomd(&[("primary", "repodata/primary.xml.gz")]).into_bytes(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repo/repodata/primary.xml.gz"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = connected(&server).await;
    let err = source.list_all_files().await.unwrap_err();

    assert_eq!(err.location, format!("{}/repo/repodata/primary.xml.gz", server.uri()));
}

#[tokio::test]
async fn test_corrupt_gzip_is_an_enumeration_failure() {
    let server = MockServer::start().await;
    let mut truncated = gzip(&repomd(&[("primary", "repodata/primary.xml")]));
    truncated.truncate(truncated.len() / 2);
    serve(&server, "/repo/repodata/repomd.xml", truncated).await;

    let source = connected(&server).await;
    let err = source.list_all_files().await.unwrap_err();

    assert_eq!(err.location, format!("{}/repo/repodata/repomd.xml", server.uri()));
}

#[tokio::test]
async fn test_malformed_xml_is_an_enumeration_failure() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/repo/repodata/repomd.xml",
        b"<repomd><data type=\"primary\"><location href=".to_vec(),
    )
    .await;

    let source = connected(&server).await;
    let err = source.list_all_files().await.unwrap_err();

    assert!(err.message.contains("XML"));
}

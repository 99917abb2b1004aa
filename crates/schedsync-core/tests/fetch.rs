//! Fetcher tests against a local mock HTTP server.
//!
//! The fetcher is synchronous, so the mock server is set up on a private
//! runtime and the fetch runs outside of it.

use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use schedsync_core::{DigestAlgorithm, FetchError, Fetcher, HttpSettings, fingerprint_bytes, fingerprint_file};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn short_timeouts() -> HttpSettings {
    HttpSettings {
        connect_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_secs(1),
    }
}

/// One-shot raw HTTP server: answers the first request with `head` and
/// `body`, then holds the connection open for `hold` before closing it.
fn raw_server(head: &'static str, body: &'static [u8], hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut request = [0u8; 4096];
        let _ = conn.read(&mut request);
        conn.write_all(head.as_bytes()).unwrap();
        conn.write_all(body).unwrap();
        conn.flush().unwrap();
        thread::sleep(hold);
    });
    format!("http://{addr}/gtfs.zip")
}

fn serve(route: &str, response: ResponseTemplate) -> (tokio::runtime::Runtime, MockServer) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    });
    (rt, server)
}

#[test]
fn downloads_body_to_file() {
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
    let (_rt, server) = serve("/gtfs.zip", ResponseTemplate::new(200).set_body_bytes(body.clone()));

    let fetcher = Fetcher::new(format!("{}/gtfs.zip", server.uri()), HttpSettings::default()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let download = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap();

    assert_eq!(download.bytes, body.len() as u64);
    assert_eq!(download.content_length, Some(body.len() as u64));
    assert_eq!(download.server_filename, None);

    let mut on_disk = Vec::new();
    std::fs::File::open(tmp.path())
        .unwrap()
        .read_to_end(&mut on_disk)
        .unwrap();
    assert_eq!(on_disk, body);
    assert_eq!(
        fingerprint_file(DigestAlgorithm::Sha256, tmp.path()).unwrap(),
        fingerprint_bytes(DigestAlgorithm::Sha256, &body)
    );
}

#[test]
fn reports_server_filename() {
    let (_rt, server) = serve(
        "/download",
        ResponseTemplate::new(200)
            .insert_header("Content-Disposition", r#"attachment; filename="GTFS_Carris.zip""#)
            .set_body_bytes(b"PK".to_vec()),
    );

    let fetcher = Fetcher::new(format!("{}/download", server.uri()), HttpSettings::default()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let download = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap();

    assert_eq!(download.server_filename.as_deref(), Some("GTFS_Carris.zip"));
}

#[test]
fn non_success_status_is_fetch_error() {
    let (_rt, server) = serve("/gtfs.zip", ResponseTemplate::new(503));

    let fetcher = Fetcher::new(format!("{}/gtfs.zip", server.uri()), HttpSettings::default()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(tmp.as_file().metadata().unwrap().len(), 0);
}

#[test]
fn missing_route_is_404() {
    let (_rt, server) = serve("/gtfs.zip", ResponseTemplate::new(200));

    let fetcher = Fetcher::new(format!("{}/other.zip", server.uri()), HttpSettings::default()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
}

#[test]
fn unreachable_host_is_transport_error() {
    // Port 9 (discard) on localhost is closed in test environments
    let fetcher = Fetcher::new("http://127.0.0.1:9/gtfs.zip", HttpSettings::default()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
}

#[test]
fn stalled_response_headers_time_out() {
    let (_rt, server) = serve(
        "/gtfs.zip",
        ResponseTemplate::new(200)
            .set_body_bytes(b"PK".to_vec())
            .set_delay(Duration::from_secs(6)),
    );

    let fetcher = Fetcher::new(format!("{}/gtfs.zip", server.uri()), short_timeouts()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let started = Instant::now();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(4), "waited {:?}", started.elapsed());
    assert!(
        matches!(&err, FetchError::Io(e) if e.kind() == io::ErrorKind::TimedOut),
        "got {err:?}"
    );
}

#[test]
fn body_shorter_than_content_length_fails() {
    let url = raw_server(
        "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n",
        b"0123456789",
        Duration::ZERO,
    );

    let fetcher = Fetcher::new(url, short_timeouts()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert!(
        matches!(err, FetchError::Io(_) | FetchError::Truncated { .. } | FetchError::Transport { .. }),
        "got {err:?}"
    );
    assert_eq!(err.status(), None);
}

#[test]
fn body_stalled_mid_transfer_times_out() {
    let url = raw_server(
        "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n",
        b"0123456789",
        Duration::from_secs(5),
    );

    let fetcher = Fetcher::new(url, short_timeouts()).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let started = Instant::now();
    let err = fetcher
        .download_into(tmp.as_file_mut(), &ProgressBar::hidden())
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(4), "waited {:?}", started.elapsed());
    assert!(
        matches!(&err, FetchError::Io(e) if e.kind() == io::ErrorKind::TimedOut),
        "got {err:?}"
    );
}

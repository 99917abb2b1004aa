//! HTTP response streaming with a per-read stall timeout.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface so the pipeline stays a plain sequence of calls.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};

/// Errors from retrieving the source artifact.
///
/// Every cause is fatal for the run; there is no per-cause retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    /// Connection, TLS, redirect or body decoding failure
    #[error("HTTP error: {message}")]
    Transport { message: String },
    /// Local I/O failure or stalled read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Body length disagrees with the declared Content-Length
    #[error("truncated transfer: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },
}

impl FetchError {
    /// Classify a reqwest error by whether the server produced a status.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::Transport {
                message: e.to_string(),
            },
        }
    }

    /// HTTP status code, if the failure came from the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shared tokio runtime for all async I/O (HTTP and object storage).
///
/// The pipeline is synchronous; async clients are driven with `block_on`.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Timeouts applied to the source HTTP client.
#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Longest gap between two body chunks before the read fails
    pub read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Build an HTTP client for the source fetch.
pub fn http_client(settings: &HttpSettings) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .user_agent(concat!("schedsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::from_reqwest(&e))
}

/// Response headers the fetcher cares about.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
}

/// HTTP GET → sync reader over the response body.
///
/// Non-success statuses are turned into [`FetchError::Status`] before any
/// body bytes are read.
pub fn open_body_reader(
    client: &reqwest::Client,
    url: &str,
    read_timeout: Duration,
) -> Result<(TimeoutReader, ResponseMeta), FetchError> {
    let url = url.to_string();

    let (reader, meta) = SHARED_RUNTIME.handle().block_on(async {
        // The read timeout also bounds the wait for response headers
        let response = tokio::time::timeout(read_timeout, client.get(&url).send())
            .await
            .map_err(|_| {
                FetchError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response headers within {}s", read_timeout.as_secs()),
                ))
            })?
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let headers = response.headers();
        let meta = ResponseMeta {
            content_length: headers
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok()),
            content_disposition: headers
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };

        let stream = response.bytes_stream();
        let async_reader = tokio_util::io::StreamReader::new(
            stream.map(|result| result.map_err(io::Error::other)),
        );

        Ok::<_, FetchError>((
            TimeoutReader::new(Box::pin(async_reader), read_timeout),
            meta,
        ))
    })?;

    Ok((reader, meta))
}

/// Async-to-sync bridge with read timeout.
///
/// Each read has a timeout; if no data arrives within it the read returns
/// `TimedOut`, which aborts the run.
pub struct TimeoutReader {
    inner: Pin<Box<dyn AsyncRead + Send + Sync>>,
    timeout: Duration,
}

impl TimeoutReader {
    fn new(inner: Pin<Box<dyn AsyncRead + Send + Sync>>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", timeout.as_secs()),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status() {
        let err = FetchError::Status {
            status: 404,
            url: "https://example.org/gtfs.zip".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP 404 from https://example.org/gtfs.zip");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn display_transport() {
        let err = FetchError::Transport {
            message: "connection refused".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn display_truncated() {
        let err = FetchError::Truncated {
            expected: 100,
            received: 42,
        };
        assert!(format!("{err}").contains("expected 100 bytes, received 42"));
    }

    #[test]
    fn io_error_converts() {
        let err: FetchError = io::Error::new(io::ErrorKind::TimedOut, "stall").into();
        assert!(format!("{err}").contains("IO error"));
    }

    #[test]
    fn default_settings() {
        let s = HttpSettings::default();
        assert_eq!(s.connect_timeout, Duration::from_secs(30));
        assert_eq!(s.read_timeout, Duration::from_secs(60));
    }
}

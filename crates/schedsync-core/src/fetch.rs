//! Source artifact retrieval into run-scoped local storage.

use std::fs::File;
use std::io::{BufWriter, Read, Write};

use indicatif::{HumanBytes, ProgressBar};

use crate::progress::upgrade_to_bar;
use crate::stream::{FetchError, HttpSettings, http_client, open_body_reader};

/// Copy buffer for streaming the body to disk (64KB)
const COPY_BUF_SIZE: usize = 64 * 1024;

/// What was written by a successful [`Fetcher::download_into`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Bytes written to the destination
    pub bytes: u64,
    /// Declared Content-Length, if the server sent one
    pub content_length: Option<u64>,
    /// Filename suggested by `Content-Disposition`
    pub server_filename: Option<String>,
}

/// Retrieves the artifact from a fixed URL.
pub struct Fetcher {
    client: reqwest::Client,
    url: String,
    settings: HttpSettings,
}

impl Fetcher {
    pub fn new(url: impl Into<String>, settings: HttpSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(&settings)?,
            url: url.into(),
            settings,
        })
    }

    /// Stream the full response body into `dest`.
    ///
    /// The body never has to fit in memory. A body that ends before (or runs
    /// past) a declared Content-Length is reported as [`FetchError::Truncated`].
    pub fn download_into(&self, dest: &mut File, pb: &ProgressBar) -> Result<Download, FetchError> {
        log::info!("Downloading {}", self.url);
        pb.set_message("connecting...");

        let (mut reader, meta) = open_body_reader(&self.client, &self.url, self.settings.read_timeout)?;
        if let Some(total) = meta.content_length {
            upgrade_to_bar(pb, total);
        }
        pb.set_message("downloading");

        let mut writer = BufWriter::with_capacity(COPY_BUF_SIZE, dest);
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut written = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            written += n as u64;
            pb.inc(n as u64);
        }
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        if let Some(expected) = meta.content_length {
            if expected != written {
                return Err(FetchError::Truncated {
                    expected,
                    received: written,
                });
            }
        }

        let server_filename = meta
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition);
        if let Some(name) = &server_filename {
            log::debug!("Server suggests filename {name}");
        }

        log::info!("Downloaded {} from {}", HumanBytes(written), self.url);
        Ok(Download {
            bytes: written,
            content_length: meta.content_length,
            server_filename,
        })
    }
}

/// Extract the `filename` parameter of a Content-Disposition header.
///
/// Quotes and any directory components are stripped, so the result is always
/// a bare file name. `filename*` (RFC 5987) is not interpreted.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').find_map(|part| {
        let (key, val) = part.split_once('=')?;
        key.trim().eq_ignore_ascii_case("filename").then(|| val.trim())
    })?;
    let unquoted = raw.trim_matches('"');
    let name = unquoted.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_quoted() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="GTFS_Carris.zip""#),
            Some("GTFS_Carris.zip".to_string())
        );
    }

    #[test]
    fn disposition_bare() {
        assert_eq!(
            filename_from_disposition("attachment; filename=feed.zip"),
            Some("feed.zip".to_string())
        );
    }

    #[test]
    fn disposition_case_insensitive_key() {
        assert_eq!(
            filename_from_disposition("attachment; FileName=\"a.zip\""),
            Some("a.zip".to_string())
        );
    }

    #[test]
    fn disposition_strips_directories() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="C:\temp\x.zip""#),
            Some("x.zip".to_string())
        );
    }

    #[test]
    fn disposition_without_filename() {
        assert_eq!(filename_from_disposition("inline"), None);
        assert_eq!(filename_from_disposition("attachment; size=10"), None);
    }

    #[test]
    fn disposition_ignores_extended_param() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''x.zip"),
            None
        );
    }

    #[test]
    fn disposition_rejects_dot_names() {
        assert_eq!(filename_from_disposition("attachment; filename=\"..\""), None);
        assert_eq!(filename_from_disposition("attachment; filename=\"\""), None);
    }
}

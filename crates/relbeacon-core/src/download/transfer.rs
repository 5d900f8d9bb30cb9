//! Blocking single-stream GET into a `.part` file, renamed on success.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use curl::easy::Easy;

use super::{DownloadOptions, DownloadProgress};
use crate::error::{DownloadError, FetchError};
use crate::net::{map_curl_error, USER_AGENT};

/// Bytes per second below which a transfer counts as stalled.
const LOW_SPEED_LIMIT: u32 = 1024;

/// `app.apk` -> `app.apk.part`.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams `url` to `dest`. Returns the number of bytes written. The partial
/// file is removed on any failure.
pub(crate) fn fetch_to_file(
    url: &str,
    dest: &Path,
    options: &DownloadOptions,
    report: &dyn Fn(DownloadProgress),
) -> Result<u64, DownloadError> {
    let part = part_path(dest);
    let file = File::create(&part).map_err(|source| DownloadError::Io {
        path: part.clone(),
        source,
    })?;

    let result = stream(url, &part, file, options, report);
    match result {
        Ok(written) => {
            fs::rename(&part, dest).map_err(|source| DownloadError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
            Ok(written)
        }
        Err(err) => {
            let _ = fs::remove_file(&part);
            Err(err)
        }
    }
}

fn stream(
    url: &str,
    part: &Path,
    mut file: File,
    options: &DownloadOptions,
    report: &dyn Fn(DownloadProgress),
) -> Result<u64, DownloadError> {
    let fail =
        |e: curl::Error| DownloadError::from(map_curl_error(url, &e, options.stall_timeout));
    let mut written: u64 = 0;
    let mut write_error: Option<std::io::Error> = None;
    let mut last_reported: u64 = 0;

    let mut easy = Easy::new();
    easy.url(url).map_err(fail)?;
    easy.get(true).map_err(fail)?;
    easy.follow_location(true).map_err(fail)?;
    easy.max_redirections(10).map_err(fail)?;
    easy.useragent(USER_AGENT).map_err(fail)?;
    easy.connect_timeout(options.connect_timeout).map_err(fail)?;
    easy.low_speed_limit(LOW_SPEED_LIMIT).map_err(fail)?;
    easy.low_speed_time(options.stall_timeout).map_err(fail)?;
    easy.progress(true).map_err(fail)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_error = Some(e);
                    // Short write aborts the transfer.
                    Ok(0)
                }
            })
            .map_err(fail)?;
        transfer
            .progress_function(|total, now, _, _| {
                let downloaded = now as u64;
                if downloaded != last_reported {
                    last_reported = downloaded;
                    report(DownloadProgress {
                        downloaded,
                        total: (total > 0.0).then_some(total as u64),
                    });
                }
                true
            })
            .map_err(fail)?;
        transfer.perform()
    };

    if let Some(source) = write_error {
        return Err(DownloadError::Io {
            path: part.to_path_buf(),
            source,
        });
    }
    performed.map_err(fail)?;

    let code = easy.response_code().map_err(fail)?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: u16::try_from(code).unwrap_or(0),
            status_text: String::new(),
        }
        .into());
    }

    let expected = easy.content_length_download().map_err(fail)?;
    if expected > 0.0 && written != expected as u64 {
        return Err(DownloadError::Incomplete {
            url: url.to_string(),
            received: written,
            expected: expected as u64,
        });
    }

    file.flush().map_err(|source| DownloadError::Io {
        path: part.to_path_buf(),
        source,
    })?;
    tracing::debug!(url, bytes = written, "transfer complete");
    Ok(written)
}

//! Single-stream HTTP GET.

use std::io::Write;
use std::sync::{Arc, Mutex};

use super::{FetchError, HttpOptions};

/// Downloads `url` with one GET, streaming the body into `writer`.
/// Returns the number of bytes written.
pub fn get_to_writer<W: Write>(
    url: &str,
    opts: &HttpOptions,
    writer: &mut W,
) -> Result<u64, FetchError> {
    let mut written: u64 = 0;
    let write_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
    let write_error_cb = Arc::clone(&write_error);

    let mut easy = opts.easy(url).map_err(FetchError::curl(url))?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match writer.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    tracing::warn!("GET write failed: {}", e);
                    if let Ok(mut slot) = write_error_cb.lock() {
                        slot.replace(e);
                    }
                    Ok(0) // abort transfer
                }
            })
            .map_err(FetchError::curl(url))?;
        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if let Some(io_err) = write_error.lock().ok().and_then(|mut s| s.take()) {
                    return Err(FetchError::Io(io_err));
                }
            }
            return Err(FetchError::Curl {
                url: url.to_string(),
                source: e,
            });
        }
    }

    let status = easy.response_code().map_err(FetchError::curl(url))?;
    if !(200..300).contains(&status) {
        return Err(FetchError::Http {
            url: url.to_string(),
            status,
        });
    }
    let content_length = easy.content_length_download().ok().filter(|n| *n >= 0.0);
    if let Some(expected) = content_length.map(|n| n as u64) {
        if written != expected {
            return Err(FetchError::PartialTransfer {
                url: url.to_string(),
                expected,
                received: written,
            });
        }
    }
    tracing::debug!(%url, bytes = written, "GET complete");
    Ok(written)
}

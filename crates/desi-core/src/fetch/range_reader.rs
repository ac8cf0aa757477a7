//! `Read + Seek` over a remote file using HTTP Range requests.
//!
//! Small reads are served from one block of [`BLOCK_SIZE`] bytes; only the
//! most recent block is kept. Reads larger than a block go to the server as a
//! single request.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use super::{FetchError, HttpOptions};

/// Bytes fetched per request for small reads.
pub const BLOCK_SIZE: u64 = 2880 * 10;

pub struct RangeReader {
    url: String,
    len: u64,
    pos: u64,
    easy: curl::easy::Easy,
    /// Start offset and bytes of the last fetched block.
    block: Option<(u64, Vec<u8>)>,
    requests: usize,
}

impl fmt::Debug for RangeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeReader")
            .field("url", &self.url)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("requests", &self.requests)
            .finish()
    }
}

impl RangeReader {
    /// `len` is the file size, typically from a HEAD probe.
    pub fn new(url: &str, len: u64, opts: HttpOptions) -> Result<Self, FetchError> {
        let easy = opts.easy(url).map_err(FetchError::curl(url))?;
        Ok(Self {
            url: url.to_string(),
            len,
            pos: 0,
            easy,
            block: None,
            requests: 0,
        })
    }

    /// Number of Range requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Fetches bytes `start..end` of the file.
    fn fetch(&mut self, start: u64, end: u64) -> Result<Vec<u8>, FetchError> {
        let url = self.url.as_str();
        let expected = end - start;
        let mut body: Vec<u8> = Vec::with_capacity(expected as usize);
        self.easy
            .range(&format!("{}-{}", start, end - 1))
            .map_err(FetchError::curl(url))?;
        {
            let mut transfer = self.easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(FetchError::curl(url))?;
            transfer.perform().map_err(FetchError::curl(url))?;
        }
        self.requests += 1;

        let status = self.easy.response_code().map_err(FetchError::curl(url))?;
        let body = if status == 206 {
            body
        } else if status == 200 && body.len() as u64 >= end {
            // Range ignored: the whole file came back.
            body[start as usize..end as usize].to_vec()
        } else {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        };
        if body.len() as u64 != expected {
            return Err(FetchError::PartialTransfer {
                url: url.to_string(),
                expected,
                received: body.len() as u64,
            });
        }
        tracing::trace!(url, start, end, "range request complete");
        Ok(body)
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }
        let remaining = self.len - self.pos;

        if buf.len() as u64 > BLOCK_SIZE {
            let n = remaining.min(buf.len() as u64);
            let bytes = self.fetch(self.pos, self.pos + n).map_err(io::Error::other)?;
            buf[..n as usize].copy_from_slice(&bytes);
            self.pos += n;
            return Ok(n as usize);
        }

        let block_start = self.pos / BLOCK_SIZE * BLOCK_SIZE;
        let cached = matches!(&self.block, Some((start, _)) if *start == block_start);
        if !cached {
            let block_end = (block_start + BLOCK_SIZE).min(self.len);
            let bytes = self.fetch(block_start, block_end).map_err(io::Error::other)?;
            self.block = Some((block_start, bytes));
        }
        let Some((start, bytes)) = &self.block else {
            return Ok(0);
        };
        let offset = (self.pos - start) as usize;
        let n = (bytes.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(off) => self.len.checked_add_signed(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

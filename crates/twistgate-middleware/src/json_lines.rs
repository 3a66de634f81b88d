//! Newline-delimited JSON input adapter.
//!
//! Each line holds one fragment, selected by its `"kind"` field:
//!
//! ```text
//! {"kind":"remote","requested_mode":2,"accel":0.3,"steer":0.1}
//! {"kind":"motion","frame_id":"base_link","linear_velocity":1.2,"angular_rate":0.0}
//! {"kind":"gear","gear":1}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.  Lines that fail to
//! decode, are not UTF-8 or exceed [`MAX_LINE_BYTES`] are logged and skipped;
//! they never end the stream.  Only EOF or a read error does.

use std::io;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;
use twistgate_types::{Fragment, GateError};

use crate::adapter::FragmentSource;

/// Upper bound on a single encoded fragment.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Decode one line.
///
/// Returns `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// [`GateError::Decode`] when the line is oversized or not a valid fragment.
pub fn decode_line(line: &str) -> Result<Option<Fragment>, GateError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    if trimmed.len() > MAX_LINE_BYTES {
        return Err(GateError::Decode(format!(
            "line is {} bytes, exceeding the limit of {MAX_LINE_BYTES}",
            trimmed.len()
        )));
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| GateError::Decode(e.to_string()))
}

/// One raw line as read from the wire, without its `\n`.
#[derive(Debug, PartialEq)]
enum RawLine {
    Eof,
    Line(Vec<u8>),
    /// Discarded up to the next newline; carries the full length seen.
    Oversized(usize),
}

/// Read up to the next `\n`, buffering at most [`MAX_LINE_BYTES`].
async fn read_line_bounded<R>(reader: &mut R) -> io::Result<RawLine>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut seen = 0usize;
    loop {
        let (used, newline) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match seen {
                    0 => RawLine::Eof,
                    n if n > MAX_LINE_BYTES => RawLine::Oversized(n),
                    _ => RawLine::Line(buf),
                });
            }
            let (take, newline) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i, true),
                None => (available.len(), false),
            };
            if seen + take <= MAX_LINE_BYTES {
                buf.extend_from_slice(&available[..take]);
            }
            seen += take;
            (take + usize::from(newline), newline)
        };
        reader.consume(used);
        if newline {
            return Ok(if seen > MAX_LINE_BYTES {
                RawLine::Oversized(seen)
            } else {
                RawLine::Line(buf)
            });
        }
    }
}

/// [`FragmentSource`] reading JSON lines from an async reader.
pub struct JsonLinesSource<R> {
    name: String,
    reader: R,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

#[async_trait]
impl<R> FragmentSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn fragments(self: Box<Self>) -> BoxStream<'static, Fragment> {
        let JsonLinesSource { name, reader } = *self;
        stream::unfold(
            (reader, name, 0u64),
            |(mut reader, name, mut line_no)| async move {
                loop {
                    line_no += 1;
                    let bytes = match read_line_bounded(&mut reader).await {
                        Ok(RawLine::Line(bytes)) => bytes,
                        Ok(RawLine::Oversized(len)) => {
                            warn!(source = %name, line = line_no, len, "skipping oversized fragment");
                            continue;
                        }
                        Ok(RawLine::Eof) => return None,
                        Err(e) => {
                            warn!(source = %name, error = %e, "fragment source read failed");
                            return None;
                        }
                    };
                    let line = match std::str::from_utf8(&bytes) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(source = %name, line = line_no, error = %e, "skipping non UTF-8 fragment");
                            continue;
                        }
                    };
                    match decode_line(line) {
                        Ok(Some(fragment)) => return Some((fragment, (reader, name, line_no))),
                        Ok(None) => {}
                        Err(e) => {
                            warn!(source = %name, line = line_no, error = %e, "skipping undecodable fragment");
                        }
                    }
                }
            },
        )
        .boxed()
    }
}

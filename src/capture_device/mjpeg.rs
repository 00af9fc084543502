//! MJPEG stream splitter
//!
//! ffmpeg `image2pipe` output is a plain concatenation of JPEG images.
//! Frames are delimited by the SOI (FF D8) and EOI (FF D9) markers.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound for a single buffered frame (16 MiB)
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Reads complete JPEG images from a byte stream
pub struct MjpegFrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MjpegFrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(READ_CHUNK * 4),
        }
    }

    /// Next complete frame, or `None` at end of stream
    pub async fn next_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.extract_frame() {
                return Ok(Some(frame));
            }
            if self.buf.len() > MAX_FRAME_BYTES {
                self.buf.clear();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "MJPEG frame exceeds size limit",
                ));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn extract_frame(&mut self) -> Option<Vec<u8>> {
        let start = match find_marker(&self.buf, SOI, 0) {
            Some(start) => start,
            None => {
                // A trailing 0xFF may be the first half of a split SOI
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                let discard = self.buf.len() - keep;
                self.buf.drain(..discard);
                return None;
            }
        };
        if start > 0 {
            self.buf.drain(..start);
        }

        let end = find_marker(&self.buf, EOI, SOI.len())?;
        Some(self.buf.drain(..end + EOI.len()).collect())
    }
}

fn find_marker(buf: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

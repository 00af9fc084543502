//! Latest-frame pump
//!
//! A background task drains the MJPEG stream continuously and keeps only the
//! newest frame, so the producer never blocks on a full pipe. A read marks the
//! current frame as seen and waits for one produced after the call.

use super::MjpegFrameReader;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct LatestFrame {
    label: String,
    rx: watch::Receiver<Option<Vec<u8>>>,
    pump: JoinHandle<()>,
}

impl LatestFrame {
    /// Start draining `reader`
    pub fn spawn<R>(reader: R, label: impl Into<String>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = watch::channel(None);
        let pump_label = label.clone();

        let pump = tokio::spawn(async move {
            let mut frames = MjpegFrameReader::new(reader);
            loop {
                match frames.next_frame().await {
                    Ok(Some(frame)) => {
                        if tx.send(Some(frame)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(device = %pump_label, "Frame stream ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(device = %pump_label, error = %e, "Frame stream read error");
                        break;
                    }
                }
            }
        });

        Self { label, rx, pump }
    }

    /// Next frame produced after this call; anything already buffered is skipped
    pub async fn next_fresh(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.rx.borrow_and_update();

        match tokio::time::timeout(timeout, self.rx.changed()).await {
            Ok(Ok(())) => self.rx.borrow_and_update().clone().ok_or_else(|| {
                Error::CaptureFailed(format!("{}: empty frame slot", self.label))
            }),
            Ok(Err(_)) => Err(Error::CaptureFailed(format!(
                "{}: capture process ended",
                self.label
            ))),
            Err(_) => Err(Error::CaptureFailed(format!(
                "{}: no frame within {}ms",
                self.label,
                timeout.as_millis()
            ))),
        }
    }

    pub fn stop(&self) {
        self.pump.abort();
    }
}

impl Drop for LatestFrame {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    fn frame(counter: u8) -> Vec<u8> {
        vec![0xFF, 0xD8, counter, 0xFF, 0xD9]
    }

    /// Writes numbered frames every 10ms; `produced` counts frames written
    fn start_source(total: u8) -> (tokio::io::DuplexStream, Arc<AtomicUsize>) {
        let (mut tx, rx) = tokio::io::duplex(64 * 1024);
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        tokio::spawn(async move {
            for i in 0..total {
                if tx.write_all(&frame(i)).await.is_err() {
                    return;
                }
                counter.store(i as usize + 1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
        (rx, produced)
    }

    #[tokio::test]
    async fn test_read_after_idle_returns_recent_frame() {
        let (rx, produced) = start_source(200);
        let mut latest = LatestFrame::spawn(rx, "/dev/video0");

        let first = latest.next_fresh(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.len(), 5);

        // Source keeps producing while nobody reads
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before_read = produced.load(Ordering::SeqCst);
        let current = latest.next_fresh(Duration::from_secs(1)).await.unwrap();

        let index = current[2] as usize;
        assert!(
            index + 2 >= before_read,
            "frame {} is older than the {} frames already produced",
            index,
            before_read
        );
        assert!(index > first[2] as usize + 10);
    }

    #[tokio::test]
    async fn test_ended_stream_fails_read() {
        let (rx, _) = start_source(1);
        let mut latest = LatestFrame::spawn(rx, "/dev/video0");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = latest.next_fresh(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::CaptureFailed(_))));
    }

    #[tokio::test]
    async fn test_silent_stream_times_out() {
        let (_tx, rx) = tokio::io::duplex(1024);
        let mut latest = LatestFrame::spawn(rx, "/dev/video0");

        let result = latest.next_fresh(Duration::from_millis(30)).await;
        assert!(matches!(result, Err(Error::CaptureFailed(m)) if m.contains("no frame")));
    }
}

//! Camera capture through an `ffmpeg` child process
//!
//! `ffmpeg` reads the platform camera and writes an MJPEG stream to stdout.
//! A reader task splits that stream into JPEG frames and publishes the most
//! recent one on a watch channel; grabbing a frame decodes the latest JPEG.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::MediaCapture;
use crate::{Error, Result};

/// How long to wait for the first frame before giving up on the device
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Output frame rate requested from ffmpeg
const STREAM_FPS: &str = "10";

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

type LatestFrame = Option<Arc<Vec<u8>>>;

/// A running ffmpeg stream
struct LiveStream {
    child: Child,
    reader: JoinHandle<()>,
    frames: watch::Receiver<LatestFrame>,
}

/// Camera backed by `ffmpeg`
pub struct FfmpegCamera {
    device: String,
    stream: Option<LiveStream>,
}

impl FfmpegCamera {
    /// Create a camera for a device; `None` selects the platform default
    #[must_use]
    pub fn new(device: Option<String>) -> Self {
        Self {
            device: device.unwrap_or_else(|| default_device().to_string()),
            stream: None,
        }
    }

    /// Device this camera opens
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f", input_format()]
            .iter()
            .map(ToString::to_string)
            .collect();
        if cfg!(target_os = "macos") {
            // avfoundation refuses to open without an explicit rate
            args.extend(["-framerate".to_string(), "30".to_string()]);
        }
        args.extend(
            [
                "-i",
                self.device.as_str(),
                "-r",
                STREAM_FPS,
                "-f",
                "mjpeg",
                "-q:v",
                "3",
                "-",
            ]
            .iter()
            .map(ToString::to_string),
        );
        args
    }
}

const fn input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(windows) {
        "dshow"
    } else {
        "v4l2"
    }
}

const fn default_device() -> &'static str {
    if cfg!(target_os = "macos") {
        "0"
    } else if cfg!(windows) {
        "video=Integrated Camera"
    } else {
        "/dev/video0"
    }
}

#[async_trait]
impl MediaCapture for FfmpegCamera {
    async fn start_stream(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let ffmpeg = which::which("ffmpeg")
            .map_err(|e| Error::MediaAccess(format!("ffmpeg not found on PATH: {e}")))?;

        if input_format() == "v4l2" && !Path::new(&self.device).exists() {
            return Err(Error::MediaAccess(format!(
                "camera device {} does not exist",
                self.device
            )));
        }

        let mut child = Command::new(&ffmpeg)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::MediaAccess(format!("failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::MediaAccess("ffmpeg stdout unavailable".to_string()))?;

        let (tx, mut rx) = watch::channel::<LatestFrame>(None);
        let reader = tokio::spawn(read_frames(stdout, tx));

        // A device that opens but never produces a frame (permission denied,
        // busy, unsupported format) surfaces here
        let got_frame = matches!(
            tokio::time::timeout(FIRST_FRAME_TIMEOUT, rx.wait_for(Option::is_some)).await,
            Ok(Ok(_))
        );
        if !got_frame {
            reader.abort();
            let _ = child.kill().await;
            return Err(Error::MediaAccess(format!(
                "camera {} produced no frames",
                self.device
            )));
        }

        tracing::info!(device = %self.device, "camera stream started");
        self.stream = Some(LiveStream {
            child,
            reader,
            frames: rx,
        });
        Ok(())
    }

    async fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.reader.abort();
            if let Err(e) = stream.child.kill().await {
                tracing::warn!(error = %e, "failed to kill ffmpeg");
            }
            tracing::info!(device = %self.device, "camera stream stopped");
        }
    }

    fn is_streaming(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| !stream.reader.is_finished())
    }

    async fn grab_frame(&mut self) -> Result<RgbImage> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| Error::NotReady("no active camera stream".to_string()))?;

        let jpeg = latest_frame(&stream.frames, stream.reader.is_finished(), &self.device)?;
        let frame = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg)?;
        Ok(frame.to_rgb8())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Most recent frame of a live stream
///
/// Once the reader has ended (ffmpeg exited, camera unplugged) the last frame
/// is stale and is never served.
fn latest_frame(
    frames: &watch::Receiver<LatestFrame>,
    reader_finished: bool,
    device: &str,
) -> Result<Arc<Vec<u8>>> {
    if reader_finished {
        return Err(Error::MediaAccess(format!("camera {device} stream ended")));
    }

    frames.borrow().clone().ok_or_else(|| match frames.has_changed() {
        Err(_) => Error::MediaAccess(format!("camera {device} stream ended")),
        Ok(_) => Error::NotReady("stream has not produced a frame yet".to_string()),
    })
}

/// Read ffmpeg's stdout and publish each complete frame
///
/// The latest frame is cleared when the stream ends.
async fn read_frames(mut stdout: impl AsyncRead + Unpin, tx: watch::Sender<LatestFrame>) {
    let mut buf = Vec::with_capacity(256 * 1024);
    let mut chunk = vec![0u8; 64 * 1024];

    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(frame) = drain_jpeg_frames(&mut buf).pop() {
                    tx.send_replace(Some(Arc::new(frame)));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "camera stream read failed");
                break;
            }
        }
    }

    tx.send_replace(None);
    tracing::debug!("camera stream ended");
}

/// Pull every complete JPEG out of `buf`, leaving any partial frame in place
fn drain_jpeg_frames(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();

    loop {
        let Some(start) = find_marker(buf, 0, SOI) else {
            // A trailing 0xFF may be the first half of the next SOI
            let keep = usize::from(buf.last() == Some(&0xFF));
            let cut = buf.len() - keep;
            buf.drain(..cut);
            break;
        };

        let Some(end) = find_marker(buf, start + 2, EOI) else {
            buf.drain(..start);
            break;
        };

        frames.push(buf[start..end + 2].to_vec());
        buf.drain(..end + 2);
    }

    frames
}

fn find_marker(buf: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

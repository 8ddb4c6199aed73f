//! Frame capture
//!
//! A [`MediaCapture`] source owns a live camera stream; [`capture`] samples
//! one frame from it at native resolution, JPEG-encodes it, and returns raw
//! base64 ready for the relay.

mod ffmpeg;
mod still;

pub use ffmpeg::FfmpegCamera;
pub use still::StillImageCamera;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use crate::relay::normalize_image;
use crate::{Error, Result};

/// JPEG quality used for captured frames (0.8 on a 0-1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Capability interface for a camera-like frame source
#[async_trait]
pub trait MediaCapture: Send {
    /// Acquire the stream
    ///
    /// # Errors
    ///
    /// Returns `Error::MediaAccess` if the device is unavailable or access is denied
    async fn start_stream(&mut self) -> Result<()>;

    /// Release the stream; calling it without an active stream is a no-op
    async fn stop_stream(&mut self);

    /// Whether a stream is currently bound
    fn is_streaming(&self) -> bool;

    /// Sample the current frame at the stream's native resolution
    ///
    /// # Errors
    ///
    /// Returns `Error::NotReady` if no stream is bound or no frame has arrived
    async fn grab_frame(&mut self) -> Result<RgbImage>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Capture one frame as raw base64 JPEG
///
/// # Errors
///
/// - `Error::NotReady` if no stream is bound; the caller must not send a request
/// - `Error::Image` if encoding fails
pub async fn capture(camera: &mut dyn MediaCapture, quality: u8) -> Result<String> {
    if !camera.is_streaming() {
        return Err(Error::NotReady("no active camera stream".to_string()));
    }

    let frame = camera.grab_frame().await?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(Error::NotReady("stream has not produced a frame yet".to_string()));
    }

    let data_url = encode_data_url(&frame, quality)?;
    tracing::debug!(
        source = camera.name(),
        width = frame.width(),
        height = frame.height(),
        encoded_len = data_url.len(),
        "captured frame"
    );

    Ok(normalize_image(&data_url).to_string())
}

/// Encode a frame as a `data:image/jpeg;base64,...` URL
///
/// # Errors
///
/// Returns `Error::Image` if JPEG encoding fails
pub fn encode_data_url(frame: &RgbImage, quality: u8) -> Result<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory source that serves a fixed frame once started
    struct FixedCamera {
        frame: RgbImage,
        streaming: bool,
    }

    #[async_trait]
    impl MediaCapture for FixedCamera {
        async fn start_stream(&mut self) -> Result<()> {
            self.streaming = true;
            Ok(())
        }

        async fn stop_stream(&mut self) {
            self.streaming = false;
        }

        fn is_streaming(&self) -> bool {
            self.streaming
        }

        async fn grab_frame(&mut self) -> Result<RgbImage> {
            Ok(self.frame.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    #[tokio::test]
    async fn capture_without_stream_is_not_ready() {
        let mut camera = FixedCamera {
            frame: gradient(4, 4),
            streaming: false,
        };
        let err = capture(&mut camera, DEFAULT_JPEG_QUALITY).await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
    }

    #[tokio::test]
    async fn capture_returns_bare_base64_jpeg_at_native_size() {
        let mut camera = FixedCamera {
            frame: gradient(64, 48),
            streaming: false,
        };
        camera.start_stream().await.unwrap();

        let image = capture(&mut camera, DEFAULT_JPEG_QUALITY).await.unwrap();
        assert!(!image.starts_with("data:"));

        let jpeg = BASE64.decode(&image).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[tokio::test]
    async fn empty_frame_is_not_ready() {
        let mut camera = FixedCamera {
            frame: RgbImage::new(0, 0),
            streaming: true,
        };
        let err = capture(&mut camera, DEFAULT_JPEG_QUALITY).await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
    }

    #[test]
    fn data_url_has_jpeg_prefix() {
        let url = encode_data_url(&gradient(8, 8), DEFAULT_JPEG_QUALITY).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,/9j/"));
    }
}

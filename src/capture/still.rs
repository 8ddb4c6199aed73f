//! A single image file served as if it were a camera stream

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::RgbImage;

use super::MediaCapture;
use crate::{Error, Result};

/// Frame source backed by one image file
pub struct StillImageCamera {
    path: PathBuf,
    frame: Option<RgbImage>,
}

impl StillImageCamera {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaCapture for StillImageCamera {
    async fn start_stream(&mut self) -> Result<()> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::MediaAccess(format!("cannot open {}: {e}", self.path.display()))
        })?;
        let frame = image::load_from_memory(&bytes).map_err(|e| {
            Error::MediaAccess(format!("cannot decode {}: {e}", self.path.display()))
        })?;

        tracing::info!(
            path = %self.path.display(),
            width = frame.width(),
            height = frame.height(),
            "still image stream started"
        );
        self.frame = Some(frame.to_rgb8());
        Ok(())
    }

    async fn stop_stream(&mut self) {
        self.frame = None;
    }

    fn is_streaming(&self) -> bool {
        self.frame.is_some()
    }

    async fn grab_frame(&mut self) -> Result<RgbImage> {
        self.frame
            .clone()
            .ok_or_else(|| Error::NotReady("no active image stream".to_string()))
    }

    fn name(&self) -> &'static str {
        "still-image"
    }
}

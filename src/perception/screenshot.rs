// Screenshot capture of the primary monitor.
use async_trait::async_trait;
use xcap::Monitor;

use crate::errors::{DeskError, DeskResult};
use crate::perception::traits::ScreenCapture;
use crate::perception::types::{Frame, Logical, ScreenSize};

/// `ScreenCapture` over xcap, always targeting the primary monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapture;

impl XcapCapture {
    pub fn new() -> Self {
        Self
    }
}

fn primary_monitor() -> DeskResult<Monitor> {
    let monitors = Monitor::all()
        .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("enumerate monitors: {e}")))?;
    let count = monitors.len();
    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary() {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }
    tracing::debug!(count, "no monitor flagged primary; using the first one");
    fallback.ok_or_else(|| DeskError::ScreenshotEncodeFailure("no monitors found".into()))
}

async fn on_blocking<T, F>(f: F) -> DeskResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DeskResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("join: {e}")))?
}

#[async_trait]
impl ScreenCapture for XcapCapture {
    async fn grab_frame(&self) -> DeskResult<Frame<Logical>> {
        on_blocking(|| {
            let monitor = primary_monitor()?;
            let pixels = monitor
                .capture_image()
                .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("capture: {e}")))?;
            tracing::debug!(
                width = pixels.width(),
                height = pixels.height(),
                "primary monitor captured"
            );
            // xcap links an older `image` release; re-wrap the raw RGBA bytes.
            let (w, h) = (pixels.width(), pixels.height());
            let pixels = image::RgbaImage::from_raw(w, h, pixels.into_raw()).ok_or_else(|| {
                DeskError::ScreenshotEncodeFailure("capture: buffer size mismatch".into())
            })?;
            Ok(Frame::new(pixels))
        })
        .await
    }

    async fn logical_size(&self) -> DeskResult<ScreenSize> {
        on_blocking(|| {
            let monitor = primary_monitor()?;
            Ok(ScreenSize::new(monitor.width(), monitor.height()))
        })
        .await
    }
}

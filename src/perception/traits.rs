use async_trait::async_trait;
use image::RgbaImage;

use crate::errors::DeskResult;
use crate::perception::types::{EncodedImage, Frame, Logical, ScreenSize};

/// Screen-capture device.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Grabs the current contents of the screen. The pixel grid may be denser
    /// than logical space.
    async fn grab_frame(&self) -> DeskResult<Frame<Logical>>;

    /// Size of the screen as the pointer driver sees it.
    async fn logical_size(&self) -> DeskResult<ScreenSize>;
}

/// Compresses composited frames for the wire. Implementations are CPU-bound
/// and run on a blocking worker.
pub trait ImageCodec: Send + Sync {
    fn encode(&self, pixels: &RgbaImage) -> DeskResult<EncodedImage>;
}

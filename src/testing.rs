//! In-memory desktop used by the unit tests: records every input call and
//! serves a blank frame of whatever size the test asks for.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::RgbaImage;

use crate::errors::{DeskError, DeskResult};
use crate::executor::hotkey::KeySymbol;
use crate::executor::input::{InputBackend, MouseButton, ScrollDirection};
use crate::perception::traits::{ImageCodec, ScreenCapture};
use crate::perception::types::{Coordinate, EncodedImage, Frame, Logical, ScreenSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeySymbol),
    KeyUp(KeySymbol),
    Text(String),
    Move(i32, i32),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Click(MouseButton),
    Scroll(ScrollDirection, u32),
    ReleaseAll,
}

pub struct FakeDesktop {
    screen: Mutex<ScreenSize>,
    frame: Mutex<Option<RgbaImage>>,
    pointer: Mutex<(i32, i32)>,
    events: Mutex<Vec<InputEvent>>,
    failing_key: Mutex<Option<KeySymbol>>,
    capture_fails: AtomicBool,
    size_queries: AtomicUsize,
}

impl FakeDesktop {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: Mutex::new(ScreenSize::new(width, height)),
            frame: Mutex::new(None),
            pointer: Mutex::new((0, 0)),
            events: Mutex::new(Vec::new()),
            failing_key: Mutex::new(None),
            capture_fails: AtomicBool::new(false),
            size_queries: AtomicUsize::new(0),
        }
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        *self.pointer.lock().unwrap() = (x, y);
    }

    /// Serve this frame instead of a blank one the size of the screen.
    pub fn set_frame(&self, frame: RgbaImage) {
        *self.frame.lock().unwrap() = Some(frame);
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.screen.lock().unwrap() = ScreenSize::new(width, height);
    }

    pub fn fail_key(&self, key: KeySymbol) {
        *self.failing_key.lock().unwrap() = Some(key);
    }

    pub fn fail_capture(&self) {
        self.capture_fails.store(true, Ordering::SeqCst);
    }

    fn record(&self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl InputBackend for FakeDesktop {
    async fn press_key(&self, key: KeySymbol) -> DeskResult<()> {
        if *self.failing_key.lock().unwrap() == Some(key) {
            return Err(DeskError::Input(format!("press {key} refused")));
        }
        self.record(InputEvent::KeyDown(key));
        Ok(())
    }

    async fn release_key(&self, key: KeySymbol) -> DeskResult<()> {
        self.record(InputEvent::KeyUp(key));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> DeskResult<()> {
        self.record(InputEvent::Text(text.to_string()));
        Ok(())
    }

    async fn move_pointer(&self, to: Coordinate<Logical>) -> DeskResult<()> {
        self.set_pointer(to.x, to.y);
        self.record(InputEvent::Move(to.x, to.y));
        Ok(())
    }

    async fn press_button(&self, button: MouseButton) -> DeskResult<()> {
        self.record(InputEvent::ButtonDown(button));
        Ok(())
    }

    async fn release_button(&self, button: MouseButton) -> DeskResult<()> {
        self.record(InputEvent::ButtonUp(button));
        Ok(())
    }

    async fn click_button(&self, button: MouseButton) -> DeskResult<()> {
        self.record(InputEvent::Click(button));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> DeskResult<()> {
        self.record(InputEvent::Scroll(direction, amount));
        Ok(())
    }

    async fn pointer_position(&self) -> DeskResult<Coordinate<Logical>> {
        let (x, y) = *self.pointer.lock().unwrap();
        Ok(Coordinate::new(x, y))
    }

    async fn release_all(&self) -> DeskResult<()> {
        self.record(InputEvent::ReleaseAll);
        Ok(())
    }
}

#[async_trait]
impl ScreenCapture for FakeDesktop {
    async fn grab_frame(&self) -> DeskResult<Frame<Logical>> {
        if self.capture_fails.load(Ordering::SeqCst) {
            return Err(DeskError::ScreenshotEncodeFailure("capture device unavailable".into()));
        }
        if let Some(frame) = self.frame.lock().unwrap().clone() {
            return Ok(Frame::new(frame));
        }
        let screen = *self.screen.lock().unwrap();
        Ok(Frame::new(RgbaImage::new(screen.width, screen.height)))
    }

    async fn logical_size(&self) -> DeskResult<ScreenSize> {
        self.size_queries.fetch_add(1, Ordering::SeqCst);
        Ok(*self.screen.lock().unwrap())
    }
}

/// Stores raw RGBA behind an 8-byte width/height header so tests can look at
/// exact pixels without a lossy round trip.
pub struct RawCodec;

impl RawCodec {
    pub fn decode(image: &EncodedImage) -> RgbaImage {
        let w = u32::from_le_bytes(image.bytes[0..4].try_into().unwrap());
        let h = u32::from_le_bytes(image.bytes[4..8].try_into().unwrap());
        RgbaImage::from_raw(w, h, image.bytes[8..].to_vec()).unwrap()
    }
}

impl ImageCodec for RawCodec {
    fn encode(&self, pixels: &RgbaImage) -> DeskResult<EncodedImage> {
        let mut bytes = Vec::with_capacity(8 + pixels.as_raw().len());
        bytes.extend_from_slice(&pixels.width().to_le_bytes());
        bytes.extend_from_slice(&pixels.height().to_le_bytes());
        bytes.extend_from_slice(pixels.as_raw());
        Ok(EncodedImage {
            bytes,
            mime_type: "image/png",
        })
    }
}

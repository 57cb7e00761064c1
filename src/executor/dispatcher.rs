// Action dispatcher: validate, translate, execute.
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{InputConfig, VisionConfig};
use crate::errors::DeskResult;
use crate::executor::action::{Action, ActionRequest};
use crate::executor::coordinator::{scale_for, to_image, to_logical, ScaleFactor};
use crate::executor::hotkey::{parse_chord, press_chord};
use crate::executor::input::{InputBackend, MouseButton};
use crate::perception::pipeline::{Screenshot, ScreenshotCompositor};
use crate::perception::traits::ScreenCapture;
use crate::perception::types::{Coordinate, ImageSpace, Logical, ScreenSize};

/// What a completed action hands back to the caller.
#[derive(Debug, Clone)]
pub enum ActionOutput {
    Done,
    /// Pointer position, in image space.
    Cursor(Coordinate<ImageSpace>),
    Screenshot(Screenshot),
}

impl ActionOutput {
    /// The JSON text payload for this result.
    pub fn text_payload(&self) -> Value {
        match self {
            ActionOutput::Done => json!({ "ok": true }),
            ActionOutput::Cursor(c) => json!({ "x": c.x, "y": c.y }),
            ActionOutput::Screenshot(shot) => json!({
                "image_width": shot.width,
                "image_height": shot.height,
            }),
        }
    }
}

/// Stateless entry point. Each call re-reads the live screen size and derives
/// its own scale, so nothing carries over between requests.
pub struct ActionDispatcher {
    input: Arc<dyn InputBackend>,
    capture: Arc<dyn ScreenCapture>,
    compositor: ScreenshotCompositor,
    vision: VisionConfig,
    timing: InputConfig,
}

/// Live screen geometry for one request.
#[derive(Debug, Clone, Copy)]
struct Live {
    screen: ScreenSize,
    scale: ScaleFactor,
}

impl ActionDispatcher {
    pub fn new(
        input: Arc<dyn InputBackend>,
        capture: Arc<dyn ScreenCapture>,
        compositor: ScreenshotCompositor,
        vision: VisionConfig,
        timing: InputConfig,
    ) -> Self {
        Self {
            input,
            capture,
            compositor,
            vision,
            timing,
        }
    }

    /// Validates raw tool arguments and runs the action they describe.
    pub async fn dispatch_arguments(&self, arguments: &Value) -> DeskResult<ActionOutput> {
        let request = ActionRequest::from_arguments(arguments)?;
        let action = Action::try_from(request)?;
        self.dispatch(action).await
    }

    pub async fn dispatch(&self, action: Action) -> DeskResult<ActionOutput> {
        tracing::debug!(action = action.kind().name(), "dispatching");
        match action {
            Action::Key { chord } => {
                let symbols = parse_chord(&chord)?;
                press_chord(self.input.as_ref(), &symbols).await?;
                Ok(ActionOutput::Done)
            }
            Action::Type { text } => {
                self.input.type_text(&text).await?;
                Ok(ActionOutput::Done)
            }
            Action::MouseMove { coordinate } => {
                let target = self.translate(coordinate).await?;
                self.input.move_pointer(target).await?;
                Ok(ActionOutput::Done)
            }
            Action::LeftClick { coordinate } => self.click(coordinate, MouseButton::Left, 1).await,
            Action::RightClick { coordinate } => self.click(coordinate, MouseButton::Right, 1).await,
            Action::MiddleClick { coordinate } => {
                self.click(coordinate, MouseButton::Middle, 1).await
            }
            Action::DoubleClick { coordinate } => self.click(coordinate, MouseButton::Left, 2).await,
            Action::LeftClickDrag { coordinate } => {
                let target = self.translate(coordinate).await?;
                self.drag_to(target).await?;
                Ok(ActionOutput::Done)
            }
            Action::Scroll { coordinate, scroll } => {
                let target = self.translate(coordinate).await?;
                let amount = scroll.amount.unwrap_or(self.timing.default_scroll_amount);
                self.input.move_pointer(target).await?;
                self.input.scroll(scroll.direction, amount).await?;
                Ok(ActionOutput::Done)
            }
            Action::GetScreenshot => {
                let shot = self.compositor.capture().await?;
                tracing::info!(
                    width = shot.width,
                    height = shot.height,
                    bytes = shot.image.bytes.len(),
                    "screenshot captured"
                );
                Ok(ActionOutput::Screenshot(shot))
            }
            Action::GetCursorPosition => {
                let live = self.live().await?;
                let pointer = self.input.pointer_position().await?;
                Ok(ActionOutput::Cursor(to_image(pointer, live.scale, live.screen)))
            }
        }
    }

    async fn live(&self) -> DeskResult<Live> {
        let screen = self.capture.logical_size().await?;
        Ok(Live {
            screen,
            scale: scale_for(&self.vision, screen),
        })
    }

    async fn translate(&self, point: Coordinate<ImageSpace>) -> DeskResult<Coordinate<Logical>> {
        let live = self.live().await?;
        let logical = to_logical(point, live.scale, live.screen)?;
        tracing::debug!(
            from = ?point,
            to = ?logical,
            scale = live.scale.get(),
            "translated coordinate"
        );
        Ok(logical)
    }

    async fn click(
        &self,
        coordinate: Option<Coordinate<ImageSpace>>,
        button: MouseButton,
        count: u32,
    ) -> DeskResult<ActionOutput> {
        if let Some(point) = coordinate {
            let target = self.translate(point).await?;
            self.input.move_pointer(target).await?;
        }
        for i in 0..count {
            if i > 0 {
                pause(self.timing.double_click_interval_ms).await;
            }
            self.input.click_button(button).await?;
        }
        Ok(ActionOutput::Done)
    }

    /// Press at the current pointer, move, release. The button is released
    /// even if the move fails.
    async fn drag_to(&self, target: Coordinate<Logical>) -> DeskResult<()> {
        self.input.press_button(MouseButton::Left).await?;
        pause(self.timing.drag_delay_ms).await;
        let moved = self.input.move_pointer(target).await;
        pause(self.timing.drag_delay_ms).await;
        let released = self.input.release_button(MouseButton::Left).await;
        moved.and(released)
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{DeskError, DeskResult};

const CONFIG_ENV: &str = "DESKBRIDGE_CONFIG";
const CONFIG_FILE: &str = "config.toml";

// Marker geometry is drawn pixel by pixel on every screenshot.
const MAX_HALF_LENGTH: u32 = 512;
const MAX_STROKE_WIDTH: u32 = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub screenshot: ScreenshotConfig,
    #[serde(default)]
    pub marker: MarkerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Capacity limits of the agent's vision input. Every outgoing image fits both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_max_long_edge")]
    pub max_long_edge: u32,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            max_long_edge: default_max_long_edge(),
            max_pixels: default_max_pixels(),
        }
    }
}

fn default_max_long_edge() -> u32 {
    1568
}

fn default_max_pixels() -> u64 {
    1_205_760
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormatKind {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Wait before capturing so earlier input has finished rendering.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_format")]
    pub format: ImageFormatKind,
    #[serde(default = "default_png_compression")]
    pub png_compression: PngCompression,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            format: default_format(),
            png_compression: default_png_compression(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_format() -> ImageFormatKind {
    ImageFormatKind::Png
}

fn default_png_compression() -> PngCompression {
    PngCompression::Best
}

fn default_jpeg_quality() -> u8 {
    75
}

/// Geometry of the pointer cross drawn onto screenshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_half_length")]
    pub half_length: u32,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
    #[serde(default = "default_marker_color")]
    pub color: [u8; 3],
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            half_length: default_half_length(),
            stroke_width: default_stroke_width(),
            color: default_marker_color(),
        }
    }
}

fn default_half_length() -> u32 {
    10
}

fn default_stroke_width() -> u32 {
    3
}

fn default_marker_color() -> [u8; 3] {
    [255, 0, 0]
}

/// Timing constants for the native input backend. Built once at startup and
/// handed to every component that issues backend calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub key_delay_ms: u64,
    #[serde(default = "default_double_click_interval_ms")]
    pub double_click_interval_ms: u64,
    #[serde(default = "default_drag_delay_ms")]
    pub drag_delay_ms: u64,
    /// Scroll amounts are expressed in pixels; the wheel moves in notches.
    #[serde(default = "default_scroll_pixels_per_notch")]
    pub scroll_pixels_per_notch: u32,
    #[serde(default = "default_scroll_amount")]
    pub default_scroll_amount: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            key_delay_ms: 0,
            double_click_interval_ms: default_double_click_interval_ms(),
            drag_delay_ms: default_drag_delay_ms(),
            scroll_pixels_per_notch: default_scroll_pixels_per_notch(),
            default_scroll_amount: default_scroll_amount(),
        }
    }
}

fn default_double_click_interval_ms() -> u64 {
    80
}

fn default_drag_delay_ms() -> u64 {
    50
}

fn default_scroll_pixels_per_notch() -> u32 {
    100
}

fn default_scroll_amount() -> u32 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
        }
    }
}

fn default_tool_name() -> String {
    "computer".to_string()
}

impl AppConfig {
    /// Rejects values that would make scaling, drawing or scrolling meaningless.
    pub fn validate(&self) -> DeskResult<()> {
        if self.vision.max_long_edge == 0 || self.vision.max_pixels == 0 {
            return Err(DeskError::Config(
                "vision limits must be greater than zero".into(),
            ));
        }
        if self.marker.stroke_width == 0 || self.marker.stroke_width > MAX_STROKE_WIDTH {
            return Err(DeskError::Config(format!(
                "marker.stroke_width must be within 1..={MAX_STROKE_WIDTH}"
            )));
        }
        if self.marker.half_length > MAX_HALF_LENGTH {
            return Err(DeskError::Config(format!(
                "marker.half_length must be at most {MAX_HALF_LENGTH}"
            )));
        }
        if self.input.scroll_pixels_per_notch == 0 || self.input.default_scroll_amount == 0 {
            return Err(DeskError::Config(
                "input scroll settings must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.screenshot.jpeg_quality) {
            return Err(DeskError::Config(format!(
                "screenshot.jpeg_quality must be within 1..=100, got {}",
                self.screenshot.jpeg_quality
            )));
        }
        if self.server.tool_name.trim().is_empty() {
            return Err(DeskError::Config("server.tool_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Directories searched for `config.toml`, in priority order: next to the
/// executable, the working directory, then the per-user config directory.
fn search_dirs() -> DeskResult<Vec<PathBuf>> {
    let mut found = Vec::with_capacity(3);
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            found.push(parent.to_path_buf());
        }
    }
    found.push(std::env::current_dir()?);
    if let Some(dir) = dirs::config_dir() {
        found.push(dir.join("deskbridge"));
    }
    Ok(found)
}

/// An explicit path must exist; otherwise the first directory holding a
/// config file wins.
fn pick_config_path(explicit: Option<PathBuf>, dirs: &[PathBuf]) -> DeskResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(DeskError::Config(format!(
                "{CONFIG_ENV} points at {} which does not exist",
                path.display()
            )));
        }
        return Ok(Some(path));
    }
    for dir in dirs {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found");
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn resolve_config_path() -> DeskResult<Option<PathBuf>> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    pick_config_path(explicit, &search_dirs()?)
}

pub fn parse_config(content: &str) -> DeskResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> DeskResult<AppConfig> {
    let Some(path) = resolve_config_path()? else {
        tracing::info!("no config.toml found; using built-in defaults");
        return Ok(AppConfig::default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        max_long_edge = config.vision.max_long_edge,
        max_pixels = config.vision.max_pixels,
        "config loaded"
    );
    Ok(config)
}

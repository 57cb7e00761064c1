use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Missing required parameter `{field}` for action `{action}`")]
    MissingParameter { field: &'static str, action: &'static str },

    #[error("Coordinate ({x}, {y}) is outside the screen bounds {width}x{height}")]
    CoordinateOutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown key symbol: {0:?}")]
    UnknownKeySymbol(String),

    #[error("Invalid scroll direction: {0:?} (expected up, down, left or right)")]
    InvalidScrollDirection(String),

    #[error("Invalid scroll amount: {0:?} (expected a positive integer)")]
    InvalidScrollAmount(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotEncodeFailure(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Input backend error: {0}")]
    Input(String),

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl serde::Serialize for DeskError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DeskResult<T> = Result<T, DeskError>;

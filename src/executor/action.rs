//! Request validation: alias normalization, then the per-action field table.
//!
//! A raw argument object goes through two steps before anything touches the
//! desktop:
//!   1. `ActionRequest::from_arguments` maps alternate field names onto the
//!      canonical `action` / `coordinate` / `text` and rejects anything else.
//!   2. `Action::try_from` checks the fields each action requires (see
//!      `ActionKind::fields`) and parses action-specific text such as the
//!      `direction[:amount]` scroll text.
use serde_json::{Map, Value};

use crate::errors::{DeskError, DeskResult};
use crate::executor::input::ScrollDirection;
use crate::perception::types::{Coordinate, ImageSpace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Key,
    Type,
    MouseMove,
    LeftClick,
    LeftClickDrag,
    RightClick,
    MiddleClick,
    DoubleClick,
    Scroll,
    GetScreenshot,
    GetCursorPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    Required,
    Optional,
    Unused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    pub coordinate: Need,
    pub text: Need,
}

const fn rules(coordinate: Need, text: Need) -> FieldRules {
    FieldRules { coordinate, text }
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Key,
        ActionKind::Type,
        ActionKind::MouseMove,
        ActionKind::LeftClick,
        ActionKind::LeftClickDrag,
        ActionKind::RightClick,
        ActionKind::MiddleClick,
        ActionKind::DoubleClick,
        ActionKind::Scroll,
        ActionKind::GetScreenshot,
        ActionKind::GetCursorPosition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Key => "key",
            ActionKind::Type => "type",
            ActionKind::MouseMove => "mouse_move",
            ActionKind::LeftClick => "left_click",
            ActionKind::LeftClickDrag => "left_click_drag",
            ActionKind::RightClick => "right_click",
            ActionKind::MiddleClick => "middle_click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::Scroll => "scroll",
            ActionKind::GetScreenshot => "get_screenshot",
            ActionKind::GetCursorPosition => "get_cursor_position",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Which of `coordinate` and `text` each action takes.
    pub fn fields(self) -> FieldRules {
        use Need::*;
        match self {
            ActionKind::Key | ActionKind::Type => rules(Unused, Required),
            ActionKind::MouseMove | ActionKind::LeftClickDrag => rules(Required, Unused),
            ActionKind::LeftClick
            | ActionKind::RightClick
            | ActionKind::MiddleClick
            | ActionKind::DoubleClick => rules(Optional, Unused),
            ActionKind::Scroll => rules(Required, Required),
            ActionKind::GetScreenshot | ActionKind::GetCursorPosition => rules(Unused, Unused),
        }
    }
}

/// A canonicalized but not yet validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: String,
    pub coordinate: Option<Coordinate<ImageSpace>>,
    pub text: Option<String>,
}

const ACTION_ALIASES: &[&str] = &["type", "name"];
const COORDINATE_ALIASES: &[&str] = &["coordinates", "coords", "position"];
const TEXT_ALIASES: &[&str] = &["keys", "key", "value", "input"];

impl ActionRequest {
    /// Maps alternate field names onto canonical ones and rejects any field
    /// that is still unrecognized.
    pub fn from_arguments(arguments: &Value) -> DeskResult<Self> {
        let Some(object) = arguments.as_object() else {
            return Err(DeskError::InvalidParameter {
                field: "arguments".into(),
                reason: "expected a JSON object".into(),
            });
        };
        let canonical = canonicalize(object)?;

        let action = match canonical.get("action") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => {
                return Err(DeskError::InvalidParameter {
                    field: "action".into(),
                    reason: "expected a string".into(),
                })
            }
            None => {
                return Err(DeskError::MissingParameter {
                    field: "action",
                    action: "<none>",
                })
            }
        };
        let coordinate = match canonical.get("coordinate") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_coordinate(v)?),
        };
        let text = match canonical.get("text") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(DeskError::InvalidParameter {
                    field: "text".into(),
                    reason: "expected a string".into(),
                })
            }
        };
        Ok(Self {
            action,
            coordinate,
            text,
        })
    }
}

fn canonical_name(field: &str, has_action: bool) -> Option<&'static str> {
    match field {
        "action" => Some("action"),
        "coordinate" => Some("coordinate"),
        "text" => Some("text"),
        // `type` is only an alias while the real `action` field is absent.
        f if !has_action && ACTION_ALIASES.contains(&f) => Some("action"),
        f if COORDINATE_ALIASES.contains(&f) => Some("coordinate"),
        f if TEXT_ALIASES.contains(&f) => Some("text"),
        _ => None,
    }
}

fn canonicalize(object: &Map<String, Value>) -> DeskResult<Map<String, Value>> {
    let has_action = object.contains_key("action");
    let mut out = Map::new();
    for (field, value) in object {
        let canonical = canonical_name(field, has_action)
            .ok_or_else(|| DeskError::UnknownParameter(field.clone()))?;
        if out.contains_key(canonical) {
            return Err(DeskError::InvalidParameter {
                field: canonical.into(),
                reason: format!("given more than once (also as `{field}`)"),
            });
        }
        if field != canonical {
            tracing::debug!(alias = %field, canonical, "normalized parameter name");
        }
        out.insert(canonical.to_string(), value.clone());
    }
    Ok(out)
}

fn parse_coordinate(value: &Value) -> DeskResult<Coordinate<ImageSpace>> {
    let invalid = |reason: &str| DeskError::InvalidParameter {
        field: "coordinate".into(),
        reason: reason.into(),
    };
    let items = value
        .as_array()
        .ok_or_else(|| invalid("expected a two-element array [x, y]"))?;
    let [x, y] = items.as_slice() else {
        return Err(invalid("expected a two-element array [x, y]"));
    };
    let axis = |v: &Value| -> DeskResult<i32> {
        let n = v.as_i64().ok_or_else(|| invalid("coordinates must be integers"))?;
        i32::try_from(n).map_err(|_| invalid("coordinate is out of range"))
    };
    Ok(Coordinate::new(axis(x)?, axis(y)?))
}

/// Direction and distance parsed from a scroll `text` of the form
/// `direction[:amount]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSpec {
    pub direction: ScrollDirection,
    pub amount: Option<u32>,
}

pub fn parse_scroll(text: &str) -> DeskResult<ScrollSpec> {
    let (direction, amount) = match text.split_once(':') {
        Some((d, a)) => (d.trim(), Some(a.trim())),
        None => (text.trim(), None),
    };
    let direction = match direction.to_ascii_lowercase().as_str() {
        "up" => ScrollDirection::Up,
        "down" => ScrollDirection::Down,
        "left" => ScrollDirection::Left,
        "right" => ScrollDirection::Right,
        _ => return Err(DeskError::InvalidScrollDirection(direction.to_string())),
    };
    let amount = match amount {
        None => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n > 0 => Some(n),
            _ => return Err(DeskError::InvalidScrollAmount(raw.to_string())),
        },
    };
    Ok(ScrollSpec { direction, amount })
}

/// A validated action. Coordinates are still in image space; the
/// dispatcher translates them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Key { chord: String },
    Type { text: String },
    MouseMove { coordinate: Coordinate<ImageSpace> },
    LeftClick { coordinate: Option<Coordinate<ImageSpace>> },
    LeftClickDrag { coordinate: Coordinate<ImageSpace> },
    RightClick { coordinate: Option<Coordinate<ImageSpace>> },
    MiddleClick { coordinate: Option<Coordinate<ImageSpace>> },
    DoubleClick { coordinate: Option<Coordinate<ImageSpace>> },
    Scroll { coordinate: Coordinate<ImageSpace>, scroll: ScrollSpec },
    GetScreenshot,
    GetCursorPosition,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Key { .. } => ActionKind::Key,
            Action::Type { .. } => ActionKind::Type,
            Action::MouseMove { .. } => ActionKind::MouseMove,
            Action::LeftClick { .. } => ActionKind::LeftClick,
            Action::LeftClickDrag { .. } => ActionKind::LeftClickDrag,
            Action::RightClick { .. } => ActionKind::RightClick,
            Action::MiddleClick { .. } => ActionKind::MiddleClick,
            Action::DoubleClick { .. } => ActionKind::DoubleClick,
            Action::Scroll { .. } => ActionKind::Scroll,
            Action::GetScreenshot => ActionKind::GetScreenshot,
            Action::GetCursorPosition => ActionKind::GetCursorPosition,
        }
    }
}

impl TryFrom<ActionRequest> for Action {
    type Error = DeskError;

    fn try_from(request: ActionRequest) -> DeskResult<Self> {
        let kind = ActionKind::from_name(&request.action)
            .ok_or_else(|| DeskError::UnknownAction(request.action.clone()))?;
        let rules = kind.fields();
        let action = kind.name();

        let coordinate = match (rules.coordinate, request.coordinate) {
            (Need::Required, None) => {
                return Err(DeskError::MissingParameter {
                    field: "coordinate",
                    action,
                })
            }
            (Need::Unused, Some(c)) => {
                tracing::debug!(action, coordinate = ?c, "ignoring unused coordinate");
                None
            }
            (_, c) => c,
        };
        let text = match (rules.text, request.text) {
            (Need::Required, None) => {
                return Err(DeskError::MissingParameter {
                    field: "text",
                    action,
                })
            }
            (Need::Unused, Some(_)) => {
                tracing::debug!(action, "ignoring unused text");
                None
            }
            (_, t) => t,
        };

        // Required fields are present past this point.
        let required_coordinate = || {
            coordinate.ok_or(DeskError::MissingParameter {
                field: "coordinate",
                action,
            })
        };
        let required_text = || {
            text.clone().ok_or(DeskError::MissingParameter {
                field: "text",
                action,
            })
        };

        let built = match kind {
            ActionKind::Key => Action::Key {
                chord: required_text()?,
            },
            ActionKind::Type => Action::Type {
                text: required_text()?,
            },
            ActionKind::MouseMove => Action::MouseMove {
                coordinate: required_coordinate()?,
            },
            ActionKind::LeftClick => Action::LeftClick { coordinate },
            ActionKind::LeftClickDrag => Action::LeftClickDrag {
                coordinate: required_coordinate()?,
            },
            ActionKind::RightClick => Action::RightClick { coordinate },
            ActionKind::MiddleClick => Action::MiddleClick { coordinate },
            ActionKind::DoubleClick => Action::DoubleClick { coordinate },
            ActionKind::Scroll => Action::Scroll {
                coordinate: required_coordinate()?,
                scroll: parse_scroll(&required_text()?)?,
            },
            ActionKind::GetScreenshot => Action::GetScreenshot,
            ActionKind::GetCursorPosition => Action::GetCursorPosition,
        };
        Ok(built)
    }
}

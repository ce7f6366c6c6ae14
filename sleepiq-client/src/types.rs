//! Request and response types for the SleepIQ REST API

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Side of the bed a foundation command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    #[serde(rename = "L", alias = "left", alias = "Left")]
    Left,
    #[serde(rename = "R", alias = "right", alias = "Right")]
    Right,
}

impl Side {
    /// Wire identifier used by the preset endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manufacturer-defined numbered foundation position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preset(u8);

impl Preset {
    /// Raised ("flex") position
    pub const RAISED: Preset = Preset(1);
    /// Flat position
    pub const FLAT: Preset = Preset(4);

    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Preset that moves the foundation to the requested raised/flat state
    pub fn for_target(raised: bool) -> Self {
        if raised {
            Self::RAISED
        } else {
            Self::FLAT
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preset {}", self.0)
    }
}

/// Current head/foot positions and motion flag reported by the foundation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct FoundationStatus {
    #[serde(rename = "fsLeftHeadPosition", default, deserialize_with = "position")]
    pub left_head: i32,
    #[serde(rename = "fsLeftFootPosition", default, deserialize_with = "position")]
    pub left_foot: i32,
    #[serde(rename = "fsRightHeadPosition", default, deserialize_with = "position")]
    pub right_head: i32,
    #[serde(rename = "fsRightFootPosition", default, deserialize_with = "position")]
    pub right_foot: i32,
    #[serde(rename = "fsIsMoving", default, deserialize_with = "flag")]
    pub is_moving: bool,
}

impl FoundationStatus {
    pub fn head_position(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.left_head,
            Side::Right => self.right_head,
        }
    }

    pub fn foot_position(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.left_foot,
            Side::Right => self.right_foot,
        }
    }

    /// A side counts as raised when either section sits above zero
    pub fn is_raised(&self, side: Side) -> bool {
        self.head_position(side) > 0 || self.foot_position(side) > 0
    }
}

/// Reference to a bed in the account's bed list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BedRef {
    #[serde(rename = "bedId", alias = "bedID", deserialize_with = "identifier")]
    pub bed_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub key: String,
    #[serde(default, alias = "userID", deserialize_with = "optional_identifier")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub beds: Vec<BedRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BedList {
    #[serde(default)]
    pub beds: Vec<BedRef>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PresetRequest {
    pub speed: u8,
    pub side: Side,
    pub preset: u8,
}

/// `{"Error": {"Code": 404, "Message": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(rename = "Error")]
    pub error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteError {
    #[serde(rename = "Code", default)]
    pub code: Option<u16>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Extract the remote error from a body, if the body carries one
    pub fn parse(body: &str) -> Option<RemoteError> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
    }
}

impl RemoteError {
    pub fn describe(&self, fallback: &str) -> String {
        match (&self.message, self.code) {
            (Some(message), _) => message.clone(),
            (None, Some(code)) => format!("error code {}", code),
            (None, None) => fallback.to_string(),
        }
    }
}

/// Positions arrive as decimal strings ("10", " 0") or plain numbers
fn position<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("position out of range: {}", n))),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            trimmed
                .parse::<i32>()
                .map_err(|_| serde::de::Error::custom(format!("invalid position: {:?}", s)))
        }
        other => Err(serde::de::Error::custom(format!("invalid position: {}", other))),
    }
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64().map(|v| v != 0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("invalid flag: {:?}", s))),
        },
        other => Err(serde::de::Error::custom(format!("invalid flag: {}", other))),
    }
}

fn identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid identifier: {}", other))),
    }
}

fn optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid identifier: {}", other))),
    }
}

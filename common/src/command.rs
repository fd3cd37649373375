use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::types::ControlMode;

/// A state change requested by an observer (HTTP handler or MQTT callback).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FanCommand {
    SetMode(ControlMode),
    SetManual { frequency_hz: u32, duty_percent: u8 },
    SetMapping { start_temp_c: f32, max_temp_c: f32 },
    SetAutoEnabled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Mode,
    AutoEnabled,
    Manual,
    Mapping,
}

#[derive(Debug, Deserialize)]
struct ManualPayload {
    frequency: u32,
    duty: u8,
}

#[derive(Debug, Deserialize)]
struct MappingPayload {
    #[serde(rename = "startTemp")]
    start_temp: f32,
    #[serde(rename = "maxTemp")]
    max_temp: f32,
}

impl FanCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SetMode(_) => CommandKind::Mode,
            Self::SetAutoEnabled(_) => CommandKind::AutoEnabled,
            Self::SetManual { .. } => CommandKind::Manual,
            Self::SetMapping { .. } => CommandKind::Mapping,
        }
    }

    /// Builds a command from HTTP query parameters
    /// (`mode`, `enabled`, `frequency`/`duty`, `startTemp`/`maxTemp`).
    pub fn from_query<'a, F>(kind: CommandKind, param: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let required = |name: &'static str| {
            param(name).ok_or(ValidationError::Malformed {
                field: name,
                reason: "missing parameter".to_string(),
            })
        };

        match kind {
            CommandKind::Mode => parse_mode(required("mode")?).map(Self::SetMode),
            CommandKind::AutoEnabled => {
                parse_switch("enabled", required("enabled")?).map(Self::SetAutoEnabled)
            }
            CommandKind::Manual => Ok(Self::SetManual {
                frequency_hz: parse_number("frequency", required("frequency")?)?,
                duty_percent: parse_number("duty", required("duty")?)?,
            }),
            CommandKind::Mapping => Ok(Self::SetMapping {
                start_temp_c: parse_number("startTemp", required("startTemp")?)?,
                max_temp_c: parse_number("maxTemp", required("maxTemp")?)?,
            }),
        }
    }

    /// Parses an MQTT command payload: plain text for mode (`AUTO`/`MANUAL`)
    /// and the auto switch (`ON`/`OFF`), JSON objects for manual and mapping.
    pub fn from_mqtt(kind: CommandKind, payload: &[u8]) -> Result<Self, ValidationError> {
        match kind {
            CommandKind::Mode => parse_mode(utf8("mode", payload)?).map(Self::SetMode),
            CommandKind::AutoEnabled => {
                parse_switch("auto", utf8("auto", payload)?).map(Self::SetAutoEnabled)
            }
            CommandKind::Manual => {
                let body: ManualPayload = parse_json("manual", payload)?;
                Ok(Self::SetManual {
                    frequency_hz: body.frequency,
                    duty_percent: body.duty,
                })
            }
            CommandKind::Mapping => {
                let body: MappingPayload = parse_json("mapping", payload)?;
                Ok(Self::SetMapping {
                    start_temp_c: body.start_temp,
                    max_temp_c: body.max_temp,
                })
            }
        }
    }
}

pub fn parse_mode(value: &str) -> Result<ControlMode, ValidationError> {
    ControlMode::parse(value).ok_or_else(|| ValidationError::Malformed {
        field: "mode",
        reason: format!("expected auto or manual, got {:?}", value.trim()),
    })
}

pub fn parse_switch(field: &'static str, value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        other => Err(ValidationError::Malformed {
            field,
            reason: format!("expected ON or OFF, got {:?}", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| ValidationError::Malformed {
            field,
            reason: err.to_string(),
        })
}

fn utf8<'a>(field: &'static str, payload: &'a [u8]) -> Result<&'a str, ValidationError> {
    std::str::from_utf8(payload).map_err(|err| ValidationError::Malformed {
        field,
        reason: err.to_string(),
    })
}

fn parse_json<'a, T: Deserialize<'a>>(
    field: &'static str,
    payload: &'a [u8],
) -> Result<T, ValidationError> {
    serde_json::from_slice(payload).map_err(|err| ValidationError::Malformed {
        field,
        reason: err.to_string(),
    })
}

/// Query string of a request URI as decoded `name -> value` pairs.
/// Handles `+` and `%XX` escapes; a repeated name keeps its last value.
pub fn query_params(uri: &str) -> HashMap<String, String> {
    let query = uri.split_once('?').map_or("", |(_, query)| query);
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("temperature values must be finite")]
    NonFiniteTemperature,
    #[error("startTemp {start} must be between 0 and {ceiling}")]
    StartOutOfRange { start: f32, ceiling: f32 },
    #[error("maxTemp {max} must be between 0 and {ceiling}")]
    MaxOutOfRange { max: f32, ceiling: f32 },
    #[error("startTemp {start} must be below maxTemp {max}")]
    StartNotBelowMax { start: f32, max: f32 },
    #[error("frequency {0} Hz outside 100-40000")]
    FrequencyOutOfRange(u32),
    #[error("duty {0}% outside 0-100")]
    DutyOutOfRange(u8),
    #[error("invalid {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("settings storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write {key}: {reason}")]
    Write { key: &'static str, reason: String },
    #[error("stored value for {key} has the wrong type")]
    TypeMismatch { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PwmError {
    #[error("failed to set duty {duty}: {reason}")]
    Duty { duty: u8, reason: String },
    #[error("failed to reconfigure PWM to {hz} Hz: {reason}")]
    Frequency { hz: u32, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
    #[error("hardware fault: {0}")]
    Hardware(#[from] PwmError),
}

impl ControlError {
    /// Stable short code for transports that want one.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
            Self::Hardware(_) => "hardware",
        }
    }
}

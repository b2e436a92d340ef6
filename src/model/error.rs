use thiserror::Error;

/// Configuration errors caught before any module is initialized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelConfigError {
    #[error("filter schedule must have at least 2 entries. Got {got}")]
    ScheduleTooShort { got: usize },

    #[error("filter schedule entry {index} must be non-zero")]
    ZeroScheduleEntry { index: usize },

    #[error(
        "filter schedule entry {index} must double the previous entry (expected {expected}, got {got})"
    )]
    ScheduleNotDoubling {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("input_channels must be non-zero")]
    ZeroInputChannels,

    #[error("num_classes must be non-zero")]
    ZeroNumClasses,

    #[error("num_classes must be even to split across two decoder legs. Got {got}")]
    OddNumClasses { got: usize },
}

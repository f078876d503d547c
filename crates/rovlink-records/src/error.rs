use rovlink_frame::FrameError;

/// Errors that can occur while turning frames into records and back.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// No parser is registered for the category.
    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    /// The frame has fewer fields than the category needs.
    #[error("{category}: missing field {index}")]
    MissingSegment { category: String, index: usize },

    /// A field could not be parsed as the type its position requires.
    #[error("{category}: field {index} has invalid value {value:?}")]
    InvalidField {
        category: String,
        index: usize,
        value: String,
    },

    /// A record or command could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, RecordError>;

/// Why an inbound frame was rejected before any dispatch happened.
///
/// Every variant is local to the originating connection: the relay answers
/// with an error frame and keeps serving everyone else.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("binary frames are not supported")]
    Binary,
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl FrameError {
    /// Wire code sent back in the error frame.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) | Self::Binary => "PARSE_ERROR",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::MissingField(_) | Self::InvalidField { .. } => "INVALID_PARAMS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_by_variant() {
        assert_eq!(FrameError::Malformed("x".into()).code(), "PARSE_ERROR");
        assert_eq!(FrameError::Binary.code(), "PARSE_ERROR");
        assert_eq!(FrameError::UnknownEvent("x".into()).code(), "UNKNOWN_EVENT");
        assert_eq!(FrameError::MissingField("groupId").code(), "INVALID_PARAMS");
        assert_eq!(
            FrameError::InvalidField {
                field: "groupId",
                reason: "empty".into()
            }
            .code(),
            "INVALID_PARAMS"
        );
    }

    #[test]
    fn display_names_the_field() {
        let err = FrameError::MissingField("recipientId");
        assert_eq!(err.to_string(), "missing required field: recipientId");
    }
}

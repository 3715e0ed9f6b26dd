pub type LoopcardResult<T> = Result<T, LoopcardError>;

#[derive(thiserror::Error, Debug)]
pub enum LoopcardError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("no render surface is available")]
    SurfaceUnavailable,

    #[error("surface cannot produce a frame stream: {0}")]
    StreamUnavailable(String),

    #[error("encoder construction failed: {0}")]
    EncoderConstructionFailed(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoopcardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            LoopcardError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            LoopcardError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            LoopcardError::encode("x")
                .to_string()
                .contains("encode error:")
        );
        assert!(
            LoopcardError::EncoderConstructionFailed("no codec".into())
                .to_string()
                .contains("encoder construction failed:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = LoopcardError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}

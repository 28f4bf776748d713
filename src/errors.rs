use crate::config::BridgeConfigError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unable to allocate a {width}x{height} surface")]
    AllocationExhausted {
        width: u32,
        height: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Engine link closed")]
    LinkClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] BridgeConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_error_keeps_source() {
        let err = BridgeError::AllocationExhausted {
            width: 5000,
            height: 10,
            source: anyhow::anyhow!("too large"),
        };
        assert_eq!(err.to_string(), "Unable to allocate a 5000x10 surface");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("too large"));
    }

    #[test]
    fn url_errors_convert() {
        let err: BridgeError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
    }
}

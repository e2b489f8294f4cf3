/// Storage provider client error type.
#[derive(Debug, thiserror::Error)]
pub enum SpAuthError {
    /// No private key configured; authTypeV1 signing requires one.
    #[error("no private key configured for authTypeV1 signing")]
    MissingKey,

    /// authTypeV2 requires a caller-supplied wallet signature.
    #[error("empty wallet signature for authTypeV2")]
    MissingSignature,

    /// An auth mode integer that maps to neither supported scheme.
    #[error("invalid auth mode: {0}")]
    InvalidAuthMode(u8),

    /// Transient transport failure (reset / EOF / timeout).
    /// Callers may retry; this library never does.
    #[error("transport error (retry suggested): {0}")]
    Transport(String),

    /// Non-2xx response carrying the SP's structured error body.
    #[error("sp rejected request: status {status}, code {code}: {message}")]
    Protocol {
        /// HTTP status code of the response.
        status: u16,
        /// Server-assigned error code.
        code: String,
        /// Server-assigned error message.
        message: String,
        /// Server-assigned request id for diagnostics.
        request_id: String,
    },

    /// Non-2xx response whose body did not parse as the structured
    /// error shape (e.g. an intermediary's html 404).
    #[error("unknown sp error: status {status}")]
    Unclassified {
        /// HTTP status code of the response.
        status: u16,
        /// Raw response body, for caller diagnostics.
        body: String,
    },

    /// SP address absent from the chain registry even after a forced
    /// cache refresh.
    #[error("no endpoint registered for sp {0}")]
    EndpointNotFound(String),

    /// Unspecified internal error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl SpAuthError {
    /// Build an "Other" type SpAuthError.
    pub fn other(
        e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SpAuthError::Other(e.into())
    }

    /// True for errors surfaced before any network call that indicate a
    /// caller configuration problem. Never worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SpAuthError::MissingKey | SpAuthError::MissingSignature
        )
    }

    /// True for transient transport conditions where a caller-side retry
    /// may succeed.
    pub fn is_retry_suggested(&self) -> bool {
        matches!(self, SpAuthError::Transport(_))
    }
}

impl From<String> for SpAuthError {
    fn from(s: String) -> Self {
        #[derive(Debug)]
        struct OtherError(String);
        impl std::fmt::Display for OtherError {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl std::error::Error for OtherError {}

        SpAuthError::other(OtherError(s))
    }
}

impl From<&str> for SpAuthError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

impl From<gnfd_offchain_key::OffChainKeyError> for SpAuthError {
    fn from(e: gnfd_offchain_key::OffChainKeyError) -> Self {
        SpAuthError::other(e)
    }
}

/// Storage provider client result type.
pub type SpAuthResult<T> = Result<T, SpAuthError>;

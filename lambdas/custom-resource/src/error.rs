use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{name}: malformed source document: {reason}")]
    MalformedSource { name: String, reason: String },

    #[error("{name}: {count} SAML providers match destination '{destination}'")]
    AmbiguousDestination {
        name: String,
        destination: String,
        count: usize,
    },

    #[error("{context}")]
    TransientIo {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("execution is about to time out")]
    Timeout,
}

impl Error {
    pub fn io(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::TransientIo {
            context: context.into(),
            source: source.into(),
        }
    }
}

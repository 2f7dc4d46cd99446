use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("model text is empty")]
    EmptyModel,
    #[error("model text is missing the [{0}] section")]
    MissingSection(&'static str),
    #[error("parse model: {0}")]
    Model(#[source] casbin::Error),
    #[error("{op}: {source}")]
    Engine {
        op: &'static str,
        #[source]
        source: casbin::Error,
    },
}

impl PolicyError {
    pub(crate) fn engine(op: &'static str) -> impl FnOnce(casbin::Error) -> Self {
        move |source| PolicyError::Engine { op, source }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

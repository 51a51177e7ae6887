//! Call-scoped failure taxonomy surfaced to the host layer.
//!
//! Every variant is returned to the immediate caller; none of them take the
//! orchestrator down. Engine provisioning exhaustion is kept distinct so
//! embedders can treat it as fatal rather than per-request.

use thiserror::Error;

use viewsmith_core::view::ValidationError;
use viewsmith_bundler::BuildError;
use viewsmith_engine::EngineError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("view '{0}' is not registered")]
    NotRegistered(String),

    #[error("view '{0}' has no successful build yet")]
    NotBuilt(String),

    #[error("server render timed out: {0}")]
    RenderTimeout(String),

    #[error("server render failed: {0}")]
    Render(String),

    #[error("script engine provisioning failed: {0}")]
    EngineProvision(String),

    #[error("failed to read build artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Timeout { .. } => Error::RenderTimeout(err.to_string()),
            EngineError::Script { message } => Error::Render(message),
            EngineError::NoCapture => Error::Render(err.to_string()),
            EngineError::Provision { message } => Error::EngineProvision(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_script_failures_map_to_distinct_variants() {
        let timeout: Error = EngineError::Timeout {
            budget_ms: 5_000,
            job_budget: 10_000,
        }
        .into();
        assert!(matches!(timeout, Error::RenderTimeout(_)));

        let script: Error = EngineError::Script {
            message: "boom".to_string(),
        }
        .into();
        match script {
            Error::Render(message) => assert_eq!(message, "boom"),
            other => panic!("expected Render, got {other:?}"),
        }

        let silent: Error = EngineError::NoCapture.into();
        assert!(matches!(silent, Error::Render(_)));
    }
}

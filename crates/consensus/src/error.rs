use thiserror::Error;

/// Failures of a single external evaluation call.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The completion call did not complete.
    #[error("completion call failed: {0}")]
    Transport(#[from] anyhow::Error),

    /// The reply did not contain the expected token.
    #[error("reply did not contain {expected}: {reply:?}")]
    Parse { expected: &'static str, reply: String },
}

impl EvalError {
    pub fn parse(expected: &'static str, reply: impl Into<String>) -> Self {
        EvalError::Parse {
            expected,
            reply: reply.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::Transport(_) => "transport",
            EvalError::Parse { .. } => "parse",
        }
    }
}

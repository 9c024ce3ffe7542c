//! The engine-wide error taxonomy.

use std::fmt;

/// Every failure mode the engine loop can surface, grouped by origin:
/// schema/validation, agent invocation, VCS, store, config.
#[derive(Debug)]
pub enum EngineError {
    SchemaValidation {
        schema_key: String,
        detail: String,
    },
    UnknownSchema {
        schema_key: String,
    },
    AgentInvocation {
        agent_id: String,
        detail: String,
    },
    AgentAuthFailure {
        agent_id: String,
    },
    NoJsonExtracted {
        agent_id: String,
    },
    Vcs {
        operation: String,
        detail: String,
    },
    RebaseConflict {
        ticket_id: String,
    },
    Store {
        detail: String,
    },
    Config {
        detail: String,
    },
    InvalidTicketId(String),
    Cancelled,
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SchemaValidation { schema_key, detail } => {
                write!(f, "output failed validation against `{schema_key}`: {detail}")
            }
            EngineError::UnknownSchema { schema_key } => {
                write!(f, "no schema registered for key `{schema_key}`")
            }
            EngineError::AgentInvocation { agent_id, detail } => {
                write!(f, "agent `{agent_id}` invocation failed: {detail}")
            }
            EngineError::AgentAuthFailure { agent_id } => {
                write!(f, "agent `{agent_id}` reported an authentication failure")
            }
            EngineError::NoJsonExtracted { agent_id } => {
                write!(f, "could not extract a JSON object from agent `{agent_id}`'s output")
            }
            EngineError::Vcs { operation, detail } => {
                write!(f, "vcs operation `{operation}` failed: {detail}")
            }
            EngineError::RebaseConflict { ticket_id } => {
                write!(f, "rebase conflict replaying ticket `{ticket_id}`'s branch")
            }
            EngineError::Store { detail } => write!(f, "store error: {detail}"),
            EngineError::Config { detail } => write!(f, "config error: {detail}"),
            EngineError::InvalidTicketId(id) => write!(f, "invalid ticket id: {id}"),
            EngineError::Cancelled => write!(f, "operation cancelled"),
            EngineError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Store {
            detail: err.to_string(),
        }
    }
}

impl From<git2::Error> for EngineError {
    fn from(err: git2::Error) -> Self {
        EngineError::Vcs {
            operation: "git2".to_string(),
            detail: err.to_string(),
        }
    }
}

impl From<ralph_kernel::ticket::InvalidTicketId> for EngineError {
    fn from(err: ralph_kernel::ticket::InvalidTicketId) -> Self {
        EngineError::InvalidTicketId(err.0)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types shared across Mixcast crates.

/// Top-level error type for Mixcast operations.
#[derive(Debug, thiserror::Error)]
pub enum MixcastError {
    /// A pipeline or sub-graph description could not be turned into a graph.
    #[error("Graph construction error: {message}")]
    GraphConstruction { message: String },

    /// The engine reported a fault the pipeline cannot recover from.
    #[error("Unrecoverable engine error: {message}")]
    UnrecoverableEngine { message: String },

    #[error("Seek failed: {message}")]
    Seek { message: String },

    #[error("Missing {role} element '{name}'")]
    MissingElement { role: String, name: String },

    #[error("Failed to set {pipeline} to {target}: {message}")]
    StateChange {
        pipeline: String,
        target: String,
        message: String,
    },

    #[error("Pipeline {pipeline} already started")]
    AlreadyStarted { pipeline: String },

    #[error("Sink '{sink}' is already bound to a track")]
    AlreadyBound { sink: String },

    #[error("Input attachment error: {message}")]
    Attach { message: String },

    #[error("Layout error: {message}")]
    Layout { message: String },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using MixcastError.
pub type MixcastResult<T> = Result<T, MixcastError>;

impl MixcastError {
    pub fn graph_construction(msg: impl Into<String>) -> Self {
        Self::GraphConstruction {
            message: msg.into(),
        }
    }

    pub fn unrecoverable(msg: impl Into<String>) -> Self {
        Self::UnrecoverableEngine {
            message: msg.into(),
        }
    }

    pub fn seek(msg: impl Into<String>) -> Self {
        Self::Seek {
            message: msg.into(),
        }
    }

    pub fn missing_element(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingElement {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn attach(msg: impl Into<String>) -> Self {
        Self::Attach {
            message: msg.into(),
        }
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the caller can retry the operation with corrected input
    /// without affecting any live pipeline.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnrecoverableEngine { .. })
    }
}

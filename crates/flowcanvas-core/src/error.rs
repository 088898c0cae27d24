pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid layout config at `{path}`: {message}")]
    InvalidConfig { path: String, message: String },

    #[error("Unknown entity: {id}")]
    UnknownEntity { id: String },

    #[error("Unknown sub-element `{element}` on entity `{entity}`")]
    UnknownElement { entity: String, element: String },

    #[error("Unknown connection: {id}")]
    UnknownConnection { id: String },

    #[error("Duplicate entity id: {id}")]
    DuplicateEntity { id: String },

    #[error("Invalid connection from `{source_id}` to `{target}`: {reason}")]
    InvalidConnection {
        source_id: String,
        target: String,
        reason: &'static str,
    },

    #[error("Diagram JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

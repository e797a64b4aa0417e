/// Domain-level errors shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The caller supplied a payload that cannot be rendered.
    #[error("Validation failed: {0}")]
    Validation(String),
}

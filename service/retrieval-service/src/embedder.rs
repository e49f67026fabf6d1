//! Seam to the external embedding collaborator.

#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("input too long: {actual} > {max}")]
    InputTooLong { max: usize, actual: usize },
}

/// Black-box text-to-vector function with a fixed, deployment-wide output
/// dimensionality. Model internals live with the collaborator.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
    fn dimension(&self) -> usize;
}

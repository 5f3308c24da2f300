use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("corrupt registry payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[error("invalid shape '{0}', expected x,y,w,h")]
pub struct ParseShapeError(pub String);

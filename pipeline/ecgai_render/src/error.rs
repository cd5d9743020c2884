use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("cannot load label font {path}: {detail}")]
    Font { path: PathBuf, detail: String },
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Encode(err.to_string())
    }
}

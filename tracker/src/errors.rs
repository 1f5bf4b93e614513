use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// The source image cannot be an integer upscale of the declared
    /// logical size. Raised before any decode work happens.
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    #[error("buffer of {len} bytes does not fill {width}x{height}")]
    SizeMismatch { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Palette(#[from] structures::PaletteError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;

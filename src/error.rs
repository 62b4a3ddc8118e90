use thiserror::Error;

/// Errors that can occur while converting an image.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConvertError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("invalid quality profile: {0}")]
    InvalidProfile(String),

    #[error("failed to read preset: {0}")]
    Preset(String),

    #[error("invalid background: {0}")]
    Background(#[from] BackgroundError),

    #[error("background removal failed: {0}")]
    BackgroundRemoval(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Validation failures for background colors and model names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackgroundError {
    #[error("invalid solid color {0:?}: use a hex color code like #ffffff")]
    InvalidColor(String),

    #[error("gradient background requires at least two hex colors, e.g. linear-gradient(#ff0000, #0000ff)")]
    GradientNeedsTwoColors,

    #[error("unknown background model {0:?}: expected one of silueta, u2netp, u2net, isnet-general-use")]
    UnknownModel(String),
}

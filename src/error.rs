use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid master pattern: {0}")]
    InvalidMaster(String),

    #[error("Invalid capture: {0}")]
    InvalidCapture(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, CdpError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("tiling misconfigured: {0}")]
    MisconfiguredTiling(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("label file: {0}")]
    Labels(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

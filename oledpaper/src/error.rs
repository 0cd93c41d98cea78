use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Unsupported pixel buffer shape: {0}")]
    Shape(String),
    #[error("No image loaded")]
    NoImage,
    #[error("Pipeline has been shut down")]
    Shutdown,
    #[error("Invalid file extension: {0}")]
    InvalidExtension(String),
    #[error("Worker thread panicked")]
    WorkerPanicked,
    #[error("Worker cannot be stopped from its own thread")]
    StopFromWorkerThread,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(Error::configuration("x")
            .to_string()
            .starts_with("Invalid configuration:"));
        assert!(Error::shape("x")
            .to_string()
            .starts_with("Unsupported pixel buffer shape:"));
        assert_eq!(Error::NoImage.to_string(), "No image loaded");
        assert_eq!(Error::Shutdown.to_string(), "Pipeline has been shut down");
    }

    #[test]
    fn io_error_converts() {
        let err: Error = io::Error::other("boom").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("boom"));
    }
}

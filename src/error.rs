use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No scanner signatures loaded")]
    NoSignaturesLoaded,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid trained model: {0}")]
    InvalidModel(String),
}

impl ScanError {
    /// Display-ready reason string, decoupled from the internal error text.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Decode(_) => "The file could not be read as a valid image.".into(),
            ScanError::Io(_) => "The file could not be opened.".into(),
            ScanError::UnsupportedFormat(ext) => {
                format!("Files of type '{ext}' are not supported for scanner analysis.")
            }
            ScanError::NoSignaturesLoaded => {
                "No scanner signatures are configured; analysis cannot start.".into()
            }
            ScanError::InvalidParameter(_) => {
                "An analysis parameter is out of its valid range.".into()
            }
            ScanError::InvalidModel(_) => {
                "The trained classifier file is malformed and was not loaded.".into()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

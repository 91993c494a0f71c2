use thiserror::Error;

#[derive(Debug, Error)]
pub enum BioeqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(String),
}

impl BioeqError {
    pub fn config(msg: impl Into<String>) -> Self {
        BioeqError::Config(msg.into())
    }

    /// True for errors that must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BioeqError::Config(_) | BioeqError::ConfigParse(_))
    }
}

pub type Result<T> = std::result::Result<T, BioeqError>;

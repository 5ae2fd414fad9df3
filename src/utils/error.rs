use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error for partition {partition}: {message}")]
    Fetch { partition: String, message: String },

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Notification error: {0}")]
    Notify(String),
}

impl AppError {
    /// Only configuration problems stop the process; everything else is
    /// isolated to one partition, listing or notification.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    pub fn fetch(partition: impl Into<String>, message: impl ToString) -> Self {
        AppError::Fetch {
            partition: partition.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        AppError::Parse {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("{}", err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Notify(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Notify(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

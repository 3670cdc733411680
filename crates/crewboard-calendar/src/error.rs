use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid data: {0}")]
    Data(String),
}

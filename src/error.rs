use thiserror::Error;

/// Failures surfaced by the numeric core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
    #[error("no acceptable region found after {attempts} search run(s)")]
    SearchExhausted { attempts: u32 },
    #[error("evaluation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

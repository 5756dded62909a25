use thiserror::Error;

#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("Invalid work spec: {0}")]
    InvalidSpec(String),

    #[error("Throttle must be at least 1, got {0}")]
    InvalidThrottle(usize),
}

pub type Result<T> = std::result::Result<T, FanoutError>;

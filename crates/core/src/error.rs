//! Error types for the achievement overlay

use thiserror::Error;

/// Failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout or 5xx. Retried on the next tick.
    #[error("Provider unavailable: {0}")]
    Transient(String),
    
    /// Credentials rejected. Surfaced to the operator, polling continues.
    #[error("Provider rejected credentials: {0}")]
    AuthFailure(String),
    
    /// Response did not have the expected shape.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::AuthFailure(_))
    }
    
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transient(_) => "transient",
            ProviderError::AuthFailure(_) => "auth",
            ProviderError::Malformed(_) => "malformed",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Could not parse config file: {0}")]
    Parse(String),
    
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

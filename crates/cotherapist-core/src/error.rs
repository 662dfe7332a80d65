//! Error taxonomy for the reply pipeline.

use std::fmt;
use thiserror::Error;

/// Result alias for constructors that validate configuration.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result alias for calls to external collaborators.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Raised at construction time, before any request is processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("invalid threshold `{name}`: {value} (expected {expected})")]
    Threshold {
        name: String,
        value: f64,
        expected: &'static str,
    },

    #[error("weights must sum to 1.0 (got {sum:.6})")]
    WeightSum { sum: f64 },

    #[error("invalid weight for `{dimension}`: {value}")]
    Weight { dimension: String, value: f64 },

    #[error("weight mapping does not match registered scorers: {0}")]
    WeightKeys(String),

    #[error("trait `{name}`: {reason}")]
    TraitIndicators { name: String, reason: String },

    #[error("invalid lexicon pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("configuration source error: {0}")]
    Source(String),

    #[error("configuration error: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        ConfigurationError::Source(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(err: toml::de::Error) -> Self {
        ConfigurationError::Source(err.to_string())
    }
}

/// External collaborator that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Generation,
    Retrieval,
    Toxicity,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Generation => "generation",
            Service::Retrieval => "retrieval",
            Service::Toxicity => "toxicity",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation, retrieval, or toxicity call failed or timed out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{service} service failed: {message}")]
    Failed { service: Service, message: String },

    #[error("{service} service timed out after {timeout_ms}ms")]
    Timeout { service: Service, timeout_ms: u64 },
}

impl ServiceError {
    pub fn failed(service: Service, message: impl Into<String>) -> Self {
        ServiceError::Failed {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> Service {
        match self {
            ServiceError::Failed { service, .. } | ServiceError::Timeout { service, .. } => *service,
        }
    }
}

/// Failure inside the evaluator or the traits analyzer. Never fails a delivered response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("scorer `{name}` produced a non-finite value")]
    NonFinite { name: String },

    #[error("batch contains no items")]
    EmptyBatch,

    #[error("worker failed: {0}")]
    Worker(String),
}

/// Errors surfaced to the caller of `Pipeline::generate`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input validation error: {0}")]
    InputValidation(String),

    #[error("could not produce a response: {0}")]
    ExternalService(#[from] ServiceError),
}

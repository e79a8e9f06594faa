use thiserror::Error;

/// Main error type for the gbsweep system
#[derive(Error, Debug)]
pub enum GbError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Data-related errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Feature not found: {feature}")]
    FeatureNotFound { feature: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Model fitting and prediction errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model is not fitted")]
    NotFitted,

    #[error("Need at least two classes to fit a classifier, got {n_classes}")]
    TooFewClasses { n_classes: usize },

    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Unknown parameter: {parameter}")]
    UnknownParameter { parameter: String },

    #[error("Feature count mismatch: model was fitted with {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Empty input: {message}")]
    EmptyInput { message: String },
}

/// Grid search and cross-validation errors
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid parameter grid: {message}")]
    InvalidGrid { message: String },

    #[error("Invalid cross-validation setup: {message}")]
    InvalidCv { message: String },

    #[error("All {candidates} candidates failed to fit")]
    AllCandidatesFailed { candidates: usize },

    #[error("Worker pool error: {message}")]
    Pool { message: String },
}

/// Result type alias for gbsweep operations
pub type GbResult<T> = Result<T, GbError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GbError::Config(format!($($arg)*))
    };
}

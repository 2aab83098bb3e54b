use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlingError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Could not find bulk data of type '{kind}'")]
    BulkDataNotFound { kind: String },

    #[error("Database not found at {path}")]
    DatabaseMissing { path: String },

    #[error("Listener lookup on port {port} failed: {message}")]
    ListenerLookupError { port: u16, message: String },

    #[error("Process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },

    #[error("Failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service exited with {status}")]
    ServiceExited { status: String },

    #[error("Build step '{step}' failed with {status}")]
    BuildStepFailed { step: String, status: String },

    #[error("Build artifact missing at {path}")]
    ArtifactMissing { path: String },
}

/// 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Storage,
    Process,
    Build,
}

/// 錯誤嚴重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BlingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BlingError::ApiError(_) | BlingError::BulkDataNotFound { .. } => ErrorCategory::Network,
            BlingError::ConfigError { .. }
            | BlingError::ConfigValidationError { .. }
            | BlingError::InvalidConfigValueError { .. }
            | BlingError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BlingError::CsvError(_)
            | BlingError::SerializationError(_)
            | BlingError::ProcessingError { .. }
            | BlingError::ValidationError { .. } => ErrorCategory::Data,
            BlingError::IoError(_)
            | BlingError::ZipError(_)
            | BlingError::DatabaseError(_)
            | BlingError::DatabaseMissing { .. } => ErrorCategory::Storage,
            BlingError::ListenerLookupError { .. }
            | BlingError::ProcessNotFound { .. }
            | BlingError::TerminationFailed { .. }
            | BlingError::LaunchFailed { .. }
            | BlingError::ServiceExited { .. } => ErrorCategory::Process,
            BlingError::BuildStepFailed { .. } | BlingError::ArtifactMissing { .. } => {
                ErrorCategory::Build
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BlingError::ServiceExited { .. } => ErrorSeverity::Low,
            BlingError::ApiError(_) | BlingError::ListenerLookupError { .. } => {
                ErrorSeverity::Medium
            }
            BlingError::IoError(_)
            | BlingError::DatabaseMissing { .. }
            | BlingError::LaunchFailed { .. }
            | BlingError::TerminationFailed { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BlingError::ApiError(_) => "Check network connectivity and that the Scryfall API is reachable",
            BlingError::BulkDataNotFound { .. } => "Check --bulk-type against the types listed by the bulk-data endpoint",
            BlingError::ConfigError { .. }
            | BlingError::ConfigValidationError { .. }
            | BlingError::InvalidConfigValueError { .. }
            | BlingError::MissingConfigError { .. } => "Review the configuration values and try again",
            BlingError::DatabaseMissing { .. } => "Build the card database first with `bling-deck`",
            BlingError::DatabaseError(_) => "Rebuild the card database; the file may be corrupt",
            BlingError::ValidationError { .. } => "Check the decklist format: '<qty> <name> [(SET) <number>]'",
            BlingError::ListenerLookupError { .. } => "Make sure lsof is installed or /proc is readable",
            BlingError::ProcessNotFound { .. } => "The process already exited; re-run to relaunch",
            BlingError::TerminationFailed { .. } => "Check that you have permission to signal the process",
            BlingError::LaunchFailed { .. } => "Make sure the service executable is installed and on PATH",
            BlingError::ServiceExited { .. } => "Inspect the service output above",
            BlingError::BuildStepFailed { .. } => "Run the failing build step by hand to see its output",
            BlingError::ArtifactMissing { .. } => "Make sure the build steps write the artifact to the configured path",
            BlingError::IoError(_) | BlingError::ZipError(_) => "Check file permissions and free disk space",
            _ => "Re-run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Process => format!("Process problem: {}", self),
            ErrorCategory::Build => format!("Build failed: {}", self),
        }
    }

    /// 依嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl From<std::fmt::Error> for BlingError {
    fn from(e: std::fmt::Error) -> Self {
        BlingError::ProcessingError {
            message: format!("Formatting error: {}", e),
        }
    }
}

impl From<toml::de::Error> for BlingError {
    fn from(e: toml::de::Error) -> Self {
        BlingError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, BlingError>;

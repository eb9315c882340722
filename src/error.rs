use std::path::PathBuf;
use thiserror::Error;

/// Errors from the configuration store
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rotate config backup for {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    SerializeFailed(#[from] serde_json::Error),

    #[error("Write to '{path}' would break the configuration schema: {reason}")]
    SchemaViolation { path: String, reason: String },

    #[error("set() called without a key path")]
    EmptyPath,
}

/// Errors from the encrypted credential store
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Email is not configured; set it before storing a password")]
    EmailNotConfigured,

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Failed to access encryption key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encryption key file {path} is not a valid key")]
    InvalidKey { path: PathBuf },

    #[error("Failed to encrypt password")]
    EncryptFailed,

    #[error("Stored credential cannot be decrypted (encryption key changed?)")]
    Unreadable,

    #[error("System secret store error: {0}")]
    Store(#[from] keyring::Error),
}

/// Errors from the progress ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to persist progress ledger {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize progress ledger: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Why a course URL was rejected by the queue store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlProblem {
    Unparsable,
    BadScheme,
    WrongDomain,
    MissingCoursesSegment,
    MissingLessonsSuffix,
}

impl std::fmt::Display for UrlProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            UrlProblem::Unparsable => "not a parsable URL",
            UrlProblem::BadScheme => "scheme must be http or https",
            UrlProblem::WrongDomain => "host is not on the platform domain",
            UrlProblem::MissingCoursesSegment => "path does not contain a /cursos/ segment",
            UrlProblem::MissingLessonsSuffix => "path does not end with /aulas",
        };
        f.write_str(msg)
    }
}

/// Errors from the course queue store
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid course URL '{url}': {problem}")]
    InvalidUrl { url: String, problem: UrlProblem },

    #[error("Failed to persist course queue {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize course queue: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Errors from the browser abstraction
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Invalid browser configuration: {0}")]
    Config(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timed out after {timeout_ms}ms waiting for: {selector}")]
    WaitTimeout { selector: String, timeout_ms: u64 },
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Protocol(e.to_string())
    }
}

/// Errors during platform authentication
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Browser error during login: {0}")]
    Browser(#[from] BrowserError),

    #[error("Login failed: {reason}")]
    LoginFailed { reason: String },
}

/// Errors from course processors
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Cancellation requested")]
    Cancelled,
}

/// Fatal errors for a whole download run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration is invalid: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("No courses in the queue; nothing to do")]
    EmptyQueue,

    #[error("No usable credential for {email}")]
    MissingCredential { email: String },

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

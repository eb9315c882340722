pub mod auth;
pub mod browser;
pub mod config;
pub mod error;
pub mod fsio;
pub mod http;
pub mod ledger;
pub mod orchestrator;
pub mod processor;
pub mod processors;
pub mod progress;
pub mod queue;

// Re-export main types for convenience
pub use auth::{Authenticator, Credentials, FormAuthenticator};
pub use browser::{BrowserEngine, BrowserPage, BrowserSession, ChromiumEngine, LaunchOptions};
pub use config::{Config, ConfigStore, CredentialStore, DownloadKind, KeyringBackend};
pub use error::{
    AuthError, BrowserError, ConfigError, CredentialError, LedgerError, ProcessorError,
    QueueError, RunError,
};
pub use http::{HttpClient, HttpLimits, HttpResponse, ReqwestClient};
pub use ledger::{LedgerStats, ProgressLedger, SharedLedger};
pub use orchestrator::{CleanupReport, Orchestrator, RunReport};
pub use processor::{CourseProcessor, ProcessorFactory, ProcessorSpec, TransferSnapshot};
pub use processors::DefaultProcessorFactory;
pub use progress::{NoopReporter, RunEvent, RunReporter, SharedRunReporter};
pub use queue::{AddOutcome, CourseEntry, CourseQueue};

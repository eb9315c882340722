pub mod credentials;
pub mod schema;
pub mod store;

pub use credentials::{CredentialStore, KeyringBackend, MemoryBackend, SecretBackend, SERVICE_NAME};
pub use schema::{Config, DownloadKind, PdfConfig, VideoConfig};
pub use store::ConfigStore;

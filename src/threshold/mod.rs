pub mod backend;
pub mod keyserver;
pub mod mock;

// Re-export main types for convenience
pub use backend::{BackendError, DecryptRequest, EncryptRequest, ThresholdEncryption};
pub use keyserver::{KeyServerBackend, SessionCertificate};
pub use mock::MockThresholdBackend;

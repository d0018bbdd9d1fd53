pub mod vault;

// Re-export main types for convenience
pub use vault::{KeyServerEntry, VaultConfig};

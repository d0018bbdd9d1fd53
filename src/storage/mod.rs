pub mod walrus;

// Re-export main types for convenience
pub use walrus::{
    create_blob_store_from_env, BlobStore, MockBlobStore, StorageError, WalrusClient,
    WalrusConfig,
};

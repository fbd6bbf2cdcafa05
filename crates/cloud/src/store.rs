use async_trait::async_trait;
use kvgen_core::metadata::GenerationMetadata;

/// Errors from the storage service.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying HTTP request failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Storage API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The insert succeeded but returned no row.
    #[error("Metadata insert into {table} returned no rows")]
    EmptyInsert { table: String },
}

/// Where generated images and their metadata end up.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Store image bytes under `filename` and return their public URL.
    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> Result<String, StorageError>;

    /// Insert one metadata row and return the stored record.
    async fn save_metadata(
        &self,
        metadata: &GenerationMetadata,
    ) -> Result<serde_json::Value, StorageError>;

    /// Stored metadata rows, newest first, at most `limit` of them.
    async fn list_generations(&self, limit: u32) -> Result<Vec<serde_json::Value>, StorageError>;

    /// Remove the row `id` and its stored image. Returns `false` when no
    /// such row exists.
    async fn delete_generation(&self, id: &str) -> Result<bool, StorageError>;
}

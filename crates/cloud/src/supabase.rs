//! [`GenerationStore`] over the Supabase storage and table REST APIs.

use async_trait::async_trait;
use kvgen_core::metadata::GenerationMetadata;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::config::StorageConfig;
use crate::store::{GenerationStore, StorageError};

pub struct SupabaseStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl SupabaseStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Public URL of an object in the configured bucket.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, path
        )
    }

    // ---- private helpers ----

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, self.config.metadata_table)
    }

    fn object_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, filename
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.key)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.key))
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationStore for SupabaseStore {
    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> Result<String, StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url(filename)))
            .header(CONTENT_TYPE, "image/png")
            .body(bytes)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        let public_url = self.public_url(filename);
        tracing::info!(filename, bucket = %self.config.bucket, "Image uploaded to storage");
        Ok(public_url)
    }

    async fn save_metadata(
        &self,
        metadata: &GenerationMetadata,
    ) -> Result<serde_json::Value, StorageError> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(metadata)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let rows: Vec<serde_json::Value> = response.json().await?;
        let record = rows
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::EmptyInsert {
                table: self.config.metadata_table.clone(),
            })?;

        tracing::info!(filename = %metadata.filename, "Generation metadata saved");
        Ok(record)
    }

    async fn list_generations(&self, limit: u32) -> Result<Vec<serde_json::Value>, StorageError> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*".to_string()),
                ("order", "generated_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_generation(&self, id: &str) -> Result<bool, StorageError> {
        let id_filter = format!("eq.{id}");

        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("id", id_filter.as_str()), ("select", "filename")])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::ensure_success(response).await?.json().await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(false);
        };

        // A missing object must not keep the row alive.
        if let Some(filename) = row.get("filename").and_then(|v| v.as_str()) {
            let request = self.authorized(self.client.delete(self.object_url(filename)));
            let removed = match request.send().await {
                Ok(response) => Self::ensure_success(response).await.map(|_| ()),
                Err(e) => Err(StorageError::from(e)),
            };
            if let Err(e) = removed {
                tracing::warn!(id, filename, error = %e, "Failed to delete stored image");
            }
        }

        let response = self
            .authorized(self.client.delete(self.table_url()))
            .query(&[("id", id_filter.as_str())])
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(id, "Generation deleted");
        Ok(true)
    }
}

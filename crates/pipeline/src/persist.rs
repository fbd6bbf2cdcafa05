//! Persistence of generated images to object storage plus metadata.

use kvgen_cloud::{GenerationStore, StorageError};
use kvgen_core::metadata::{resolution_label, GenerationMetadata};
use kvgen_core::naming::generated_image_filename;
use kvgen_core::templates::flux_lora::FluxLoraRequest;

use crate::generate::GenerationOutcome;

/// Descriptive fields stored with every image of one generation.
#[derive(Debug, Clone)]
pub struct PersistContext {
    pub prompt: String,
    pub negative_prompt: String,
    pub style: String,
    pub product: String,
    pub resolution: String,
    pub lora_model: String,
}

impl PersistContext {
    pub fn for_flux_lora(request: &FluxLoraRequest, style: &str, product: &str) -> Self {
        Self {
            prompt: request.positive_prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            style: style.to_string(),
            product: product.to_string(),
            resolution: resolution_label(request.width, request.height),
            lora_model: request.lora_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersistedImage {
    pub node_id: String,
    pub filename: String,
    pub image_url: String,
    /// Row returned by the metadata insert.
    pub record: serde_json::Value,
}

#[derive(Debug)]
pub struct PersistFailure {
    pub filename: String,
    pub error: StorageError,
}

/// Per-image results of [`persist_generation`].
#[derive(Debug, Default)]
pub struct PersistReport {
    pub saved: Vec<PersistedImage>,
    pub failed: Vec<PersistFailure>,
}

impl PersistReport {
    pub fn all_saved(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload every image of `outcome` and record its metadata.
///
/// Images are named `generated_image_{YYYYmmdd_HHMMSS}_{seed}.png`. A
/// failure on one image is recorded in the report and the remaining
/// images are still attempted.
pub async fn persist_generation(
    store: &dyn GenerationStore,
    outcome: &GenerationOutcome,
    context: &PersistContext,
) -> PersistReport {
    let mut report = PersistReport::default();

    for (index, image) in outcome.images.iter().enumerate() {
        let filename = generated_image_filename(outcome.generated_at, outcome.seed, index);

        let saved = async {
            let image_url = store.upload_image(image.bytes.clone(), &filename).await?;
            let metadata = GenerationMetadata {
                filename: filename.clone(),
                prompt: context.prompt.clone(),
                negative_prompt: context.negative_prompt.clone(),
                style: context.style.clone(),
                product: context.product.clone(),
                resolution: context.resolution.clone(),
                lora_model: context.lora_model.clone(),
                generated_at: outcome.generated_at,
                image_url: image_url.clone(),
                seed: outcome.seed,
                node_id: image.node_id.clone(),
            };
            let record = store.save_metadata(&metadata).await?;
            Ok::<_, StorageError>((image_url, record))
        }
        .await;

        match saved {
            Ok((image_url, record)) => {
                tracing::info!(filename = %filename, "Image uploaded and metadata saved");
                report.saved.push(PersistedImage {
                    node_id: image.node_id.clone(),
                    filename,
                    image_url,
                    record,
                });
            }
            Err(error) => {
                tracing::error!(filename = %filename, error = %error, "Failed to persist image");
                report.failed.push(PersistFailure { filename, error });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use kvgen_comfyui::fetcher::FetchedImage;
    use kvgen_comfyui::history::ImageRef;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        uploads: Mutex<Vec<String>>,
        rows: Mutex<Vec<GenerationMetadata>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl GenerationStore for MemoryStore {
        async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> Result<String, StorageError> {
            if self.reject.as_deref() == Some(filename) {
                return Err(StorageError::Api {
                    status: 409,
                    body: "Duplicate".into(),
                });
            }
            self.uploads.lock().unwrap().push(filename.to_string());
            Ok(format!("https://store/public/output/{filename}"))
        }

        async fn save_metadata(
            &self,
            metadata: &GenerationMetadata,
        ) -> Result<serde_json::Value, StorageError> {
            self.rows.lock().unwrap().push(metadata.clone());
            Ok(serde_json::json!({"id": self.rows.lock().unwrap().len()}))
        }

        async fn list_generations(&self, _limit: u32) -> Result<Vec<serde_json::Value>, StorageError> {
            Ok(Vec::new())
        }

        async fn delete_generation(&self, _id: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    fn image(node: &str, name: &str) -> FetchedImage {
        FetchedImage {
            node_id: node.into(),
            image: ImageRef {
                filename: name.into(),
                subfolder: String::new(),
                folder_type: "output".into(),
            },
            bytes: b"PNG".to_vec(),
        }
    }

    fn outcome() -> GenerationOutcome {
        GenerationOutcome {
            prompt_id: "p1".into(),
            seed: 42,
            images: vec![image("9", "a.png"), image("9", "b.png")],
            generated_at: chrono::Utc.with_ymd_and_hms(2024, 11, 20, 9, 5, 7).unwrap(),
            steps: Vec::new(),
        }
    }

    fn context() -> PersistContext {
        let request = FluxLoraRequest {
            width: 1280,
            height: 1024,
            lora_name: "NCMocha.safetensors".into(),
            model_name: None,
            positive_prompt: "jar".into(),
            negative_prompt: "blurry".into(),
            batch_size: 2,
            seed: Some(42),
        };
        PersistContext::for_flux_lora(&request, "Life Style", "Nescafe Gold")
    }

    #[tokio::test]
    async fn every_image_is_uploaded_and_recorded() {
        let store = MemoryStore::default();
        let report = persist_generation(&store, &outcome(), &context()).await;

        assert!(report.all_saved());
        assert_eq!(
            *store.uploads.lock().unwrap(),
            vec![
                "generated_image_20241120_090507_42.png".to_string(),
                "generated_image_20241120_090507_42_1.png".to_string(),
            ]
        );
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows[0].resolution, "1280x1024");
        assert_eq!(rows[0].style, "Life Style");
        assert_eq!(rows[0].node_id, "9");
        assert_eq!(
            rows[0].image_url,
            "https://store/public/output/generated_image_20241120_090507_42.png"
        );
    }

    #[tokio::test]
    async fn one_failing_image_does_not_stop_the_rest() {
        let store = MemoryStore {
            reject: Some("generated_image_20241120_090507_42.png".into()),
            ..MemoryStore::default()
        };
        let report = persist_generation(&store, &outcome(), &context()).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.saved[0].filename, "generated_image_20241120_090507_42_1.png");
        assert!(!report.all_saved());
    }
}

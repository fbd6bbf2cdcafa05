/// Connection settings for the storage / database service.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Project base URL, e.g. `https://<project>.supabase.co`.
    pub url: String,
    /// Service key, sent both as `apikey` and as bearer token.
    pub key: String,
    pub bucket: String,
    pub metadata_table: String,
}

impl StorageConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            bucket: "output".to_string(),
            metadata_table: "image_generations".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless both `SUPABASE_URL` and `SUPABASE_KEY` are
    /// set; persistence is then disabled.
    ///
    /// | Env Var                   | Default             |
    /// |---------------------------|---------------------|
    /// | `SUPABASE_URL`            | (required)          |
    /// | `SUPABASE_KEY`            | (required)          |
    /// | `SUPABASE_BUCKET`         | `output`            |
    /// | `SUPABASE_METADATA_TABLE` | `image_generations` |
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty())?;
        let key = std::env::var("SUPABASE_KEY").ok().filter(|v| !v.is_empty())?;
        let mut config = Self::new(url, key);
        if let Ok(bucket) = std::env::var("SUPABASE_BUCKET") {
            config.bucket = bucket;
        }
        if let Ok(table) = std::env::var("SUPABASE_METADATA_TABLE") {
            config.metadata_table = table;
        }
        Some(config)
    }
}

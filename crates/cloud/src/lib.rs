//! Persistence of generated images: object storage for the bytes and a
//! metadata table for the generation parameters.

pub mod config;
pub mod store;
pub mod supabase;

pub use config::StorageConfig;
pub use store::{GenerationStore, StorageError};
pub use supabase::SupabaseStore;

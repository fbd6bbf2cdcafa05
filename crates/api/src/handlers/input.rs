//! Request body readers shared by the handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use base64::Engine;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Image extensions the upload routes accept.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Multipart field carrying the uploaded image.
const IMAGE_FIELD: &str = "image";

/// An uploaded image plus the text fields sent beside it.
#[derive(Debug)]
pub struct ImageForm {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl ImageForm {
    /// Text field `name`, or `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Drain a multipart body into an [`ImageForm`].
///
/// The `image` part is required and must carry an allowed extension.
/// Every other part is read as UTF-8 text.
pub async fn read_image_form(mut multipart: Multipart) -> AppResult<ImageForm> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            let filename = sanitize_filename(field.file_name().unwrap_or_default());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            image = Some((filename, data.to_vec()));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            fields.insert(name, text);
        }
    }

    let (filename, bytes) =
        image.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;
    if filename.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }
    if !is_allowed_image(&filename) {
        return Err(AppError::BadRequest(format!(
            "File type not allowed. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    Ok(ImageForm {
        filename,
        bytes,
        fields,
    })
}

/// Deserialize a JSON request body, reporting failures as 400s in the
/// shared error body.
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

/// Case-insensitive check of the extension against [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `data:<mime>;base64,<payload>` for an image named `filename`.
pub fn image_data_url(filename: &str, bytes: &[u8]) -> String {
    let mime = match filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// Keep only the last path component and drop characters that are not
/// safe in an engine-side file name.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')'))
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

//! Storage naming convention for generated images.

use crate::types::Timestamp;

/// Object name for a generated image.
///
/// Convention: `generated_image_{YYYYmmdd_HHMMSS}_{seed}.png`, with an
/// `_{index}` suffix before the extension for every image after the
/// first one of a batch so names stay unique within one second.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use kvgen_core::naming::generated_image_filename;
///
/// let at = chrono::Utc.with_ymd_and_hms(2024, 11, 20, 9, 5, 7).unwrap();
/// assert_eq!(generated_image_filename(at, 42, 0), "generated_image_20241120_090507_42.png");
/// assert_eq!(generated_image_filename(at, 42, 1), "generated_image_20241120_090507_42_1.png");
/// ```
pub fn generated_image_filename(at: Timestamp, seed: u64, index: usize) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    if index == 0 {
        format!("generated_image_{stamp}_{seed}.png")
    } else {
        format!("generated_image_{stamp}_{seed}_{index}.png")
    }
}

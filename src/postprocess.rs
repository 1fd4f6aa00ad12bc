//! CPU-bound image transforms, run off the async scheduler.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::error::MediaError;

/// Render the image at `path` as 8-bit grayscale PNG bytes.
///
/// Decoding and encoding happen on the blocking pool.
pub async fn black_and_white(path: &Path) -> Result<Vec<u8>, MediaError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || render_grayscale(&path)).await?
}

fn render_grayscale(path: &Path) -> Result<Vec<u8>, MediaError> {
    let source = image::open(path)?;
    let gray = DynamicImage::ImageLuma8(source.to_luma8());
    let mut out = Cursor::new(Vec::new());
    gray.write_to(&mut out, ImageFormat::Png)?;
    tracing::debug!(
        path = %path.display(),
        width = gray.width(),
        height = gray.height(),
        bytes = out.get_ref().len(),
        "rendered grayscale"
    );
    Ok(out.into_inner())
}

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::{DownloadError, STILL_PROCESSING};
use super::extension::MimeTable;
use crate::http::HttpResponse;
use crate::types::MediaKind;

/// Temp name for an in-progress download of `final_path`.
///
/// A random tag keeps two writers of the same index from sharing a temp file.
fn temp_download_path(final_path: &Path) -> PathBuf {
    let tag: u32 = rand::random();
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!("{}.{:08x}.part", name, tag))
}

pub fn is_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "part")
}

/// Removes an in-progress `.part` file unless it was renamed into place,
/// including when the download future is dropped mid-stream.
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed unfinished {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Validate a response and stream it into `dir` as `<index>.<ext>`.
///
/// The body goes to a `.part` file first and is renamed into place only once
/// complete, so a failed or oversized transfer never leaves anything at the
/// final path. Anything at or over `max_bytes` is rejected, declared or
/// streamed.
pub async fn save_response(
    response: HttpResponse,
    dir: &Path,
    index: usize,
    kind: MediaKind,
    mime: &MimeTable,
    max_bytes: u64,
) -> Result<PathBuf, DownloadError> {
    let url = response.url.clone();

    if response.status == STILL_PROCESSING {
        return Err(DownloadError::StillProcessing { url });
    }
    if response.status != 200 {
        return Err(DownloadError::HttpStatus {
            status: response.status,
            url,
        });
    }
    let declared = response
        .content_length
        .ok_or_else(|| DownloadError::MissingLength { url: url.clone() })?;
    if declared >= max_bytes {
        return Err(DownloadError::SizeExceeded {
            url,
            size: declared,
            limit: max_bytes,
        });
    }

    let content_type = response.content_type.clone().unwrap_or_default();
    let ext = mime
        .choose(&content_type, kind)
        .ok_or_else(|| DownloadError::UnsupportedFormat {
            url: url.clone(),
            content_type: content_type.clone(),
        })?;
    tracing::debug!(%url, %content_type, ext, "detected extension");

    let final_path = dir.join(format!("{}.{}", index, ext));
    let part = PartFile::new(temp_download_path(&final_path));

    stream_to_file(response, &part.path, max_bytes).await?;
    fs::rename(&part.path, &final_path).await?;
    part.disarm();
    Ok(final_path)
}

async fn stream_to_file(
    response: HttpResponse,
    part_path: &Path,
    max_bytes: u64,
) -> Result<u64, DownloadError> {
    let url = response.url;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part_path)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.body;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(
                "Body read error for {} (bytes_so_far={}): {}",
                url,
                bytes_written,
                e
            );
            e
        })?;
        bytes_written += chunk.len() as u64;
        if bytes_written >= max_bytes {
            return Err(DownloadError::SizeExceeded {
                url,
                size: bytes_written,
                limit: max_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(bytes_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn response(status: u16, content_type: &str, length: Option<u64>, body: &'static [u8]) -> HttpResponse {
        HttpResponse {
            url: "http://cdn/asset".into(),
            status,
            content_length: length,
            content_type: Some(content_type.into()),
            body: stream::iter(vec![Ok(Bytes::from_static(body))]).boxed(),
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_saves_under_index_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_response(
            response(200, "image/png", Some(4), b"\x89PNG"),
            dir.path(),
            3,
            MediaKind::Images,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap();
        assert_eq!(path, dir.path().join("3.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
        assert_eq!(entries(dir.path()), vec!["3.png"]);
    }

    #[tokio::test]
    async fn test_status_476_is_still_processing() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(476, "image/png", Some(4), b"...."),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::StillProcessing { .. }));
    }

    #[tokio::test]
    async fn test_missing_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(200, "image/png", None, b"...."),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::MissingLength { .. }));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_declared_oversize_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(200, "image/png", Some(4_000_001), b"...."),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::SizeExceeded { size: 4_000_001, .. }));
    }

    #[tokio::test]
    async fn test_actual_oversize_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        // declared length lies: body is bigger than the limit
        let err = save_response(
            response(200, "image/png", Some(2), b"0123456789"),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            8,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::SizeExceeded { size: 10, limit: 8, .. }));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_declared_length_at_cap_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(200, "image/png", Some(4_000_000), b"...."),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::SizeExceeded {
                size: 4_000_000,
                limit: 4_000_000,
                ..
            }
        ));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_streamed_length_at_cap_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(200, "image/png", Some(4), b"01234567"),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            8,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::SizeExceeded { size: 8, limit: 8, .. }));
        assert!(entries(dir.path()).is_empty());

        // one byte under the cap is fine
        let path = save_response(
            response(200, "image/png", Some(7), b"0123456"),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::standard(),
            8,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_dropped_download_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let resp = HttpResponse {
            url: "http://cdn/slow".into(),
            status: 200,
            content_length: Some(8),
            content_type: Some("image/png".into()),
            body: stream::iter(vec![Ok(Bytes::from_static(b"\x89PNG"))])
                .chain(stream::pending())
                .boxed(),
        };
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            save_response(
                resp,
                dir.path(),
                0,
                MediaKind::Images,
                &MimeTable::standard(),
                4_000_000,
            ),
        )
        .await;
        assert!(outcome.is_err());
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_content_type_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(
            response(200, "image/png", Some(4), b"...."),
            dir.path(),
            0,
            MediaKind::Images,
            &MimeTable::empty(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedFormat { .. }));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_body_error_removes_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let resp = HttpResponse {
            url: "http://cdn/asset".into(),
            status: 200,
            content_length: Some(8),
            content_type: Some("audio/mpeg".into()),
            body: stream::iter(vec![
                Ok(Bytes::from_static(b"ID3")),
                Err(crate::http::TransportError::new("http://cdn/asset", "reset")),
            ])
            .boxed(),
        };
        let err = save_response(
            resp,
            dir.path(),
            1,
            MediaKind::Songs,
            &MimeTable::standard(),
            4_000_000,
        )
        .await
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_temp_path_is_part_file_beside_target() {
        let target = Path::new("/cache/images/Turdus migratorius0/2.jpeg");
        let part = temp_download_path(target);
        assert!(is_temp_file(&part));
        assert_eq!(part.parent(), target.parent());
        assert!(part
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("2.jpeg."));
        assert!(!is_temp_file(target));
    }
}

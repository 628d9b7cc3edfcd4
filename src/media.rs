use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use crate::forms::UploadedFile;

const UPLOAD_DIR: &str = "posts";

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Sniffs the leading bytes for one of the image formats we accept.
pub fn is_image(bytes: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        b"GIF87a",
        b"GIF89a",
        b"\x89PNG\r\n\x1a\n",
        b"\xFF\xD8\xFF",
        b"BM",
    ];

    let webp = bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP";
    webp || SIGNATURES.iter().any(|sig| bytes.starts_with(sig))
}

fn clean_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    match cleaned.trim_start_matches('.') {
        "" => "image".to_string(),
        name => name.to_string(),
    }
}

/// Writes the upload under `<media_root>/posts/` and returns the stored
/// path relative to the media root, e.g. `posts/small.gif`.
pub async fn store_image(media_root: &Path, file: &UploadedFile) -> Result<String> {
    let dir = media_root.join(UPLOAD_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let mut name = clean_file_name(&file.file_name);
    if tokio::fs::try_exists(dir.join(&name)).await? {
        let token = Uuid::new_v4().simple().to_string();
        let suffix = &token[..7];
        name = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{name}_{suffix}"),
        };
    }

    tokio::fs::write(dir.join(&name), &file.bytes).await?;
    Ok(format!("{UPLOAD_DIR}/{name}"))
}

/// Deletes a stored upload given its path relative to the media root.
pub async fn remove_image(media_root: &Path, stored: &str) -> Result<()> {
    tokio::fs::remove_file(media_root.join(stored)).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\
\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\
\x00\x00\x00\x2C\x00\x00\x00\x00\
\x02\x00\x01\x00\x00\x02\x02\x0C\
\x0A\x00\x3B";

//! Bundles several artifacts into one zip archive.
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::Artifact;
use crate::error::{AppError, AppResult};

/// Combine artifacts into a single deflate-compressed zip, one entry per
/// artifact, entry names taken from the artifact file names.
pub fn bundle(artifacts: &[Artifact]) -> AppResult<Vec<u8>> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for artifact in artifacts {
        writer
            .start_file(&artifact.file_name, options)
            .map_err(|e| AppError::Bundling(e.to_string()))?;
        writer
            .write_all(&artifact.bytes)
            .map_err(|e| AppError::Bundling(e.to_string()))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| AppError::Bundling(e.to_string()))?;

    Ok(cursor.into_inner())
}

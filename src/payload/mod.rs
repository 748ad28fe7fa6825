//! Attachment payload resolution.
//!
//! Mail attachments carrying DMARC reports arrive as plain XML, gzipped XML
//! or archives (zip, tar.gz) whose member may or may not be named after the
//! archive.
//! [`resolve_attachment`] turns any of these into the raw XML bytes, using a
//! fresh scratch directory per call so concurrent invocations never collide.

use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::error_handling::PipelineError;

/// Resolves a raw attachment into its XML payload.
///
/// Recognized containers, tried in order:
/// 1. `*.xml.gz` — gunzipped in memory, no extraction to disk.
/// 2. `*.zip` — extracted to a scratch directory; the member derived by
///    swapping `.zip` for `.xml` is preferred, with a first-match directory
///    scan as fallback for archives whose member is named differently.
/// 3. `*.tar.gz` / `*.tgz` — unpacked to a scratch directory and scanned
///    for the first `*.xml` member.
/// 4. `*.xml` — returned as-is.
///
/// Anything else fails with [`PipelineError::UnsupportedFormat`] naming the
/// offending filename. The scratch directory is removed when the call
/// returns.
pub fn resolve_attachment(filename: &str, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if filename.ends_with(".xml.gz") {
        let mut decoder = GzDecoder::new(bytes);
        let mut xml = Vec::new();
        decoder.read_to_end(&mut xml)?;
        return Ok(xml);
    }

    if filename.ends_with(".zip") {
        return extract_from_archive(filename, bytes);
    }

    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        return extract_from_tarball(filename, bytes);
    }

    if filename.ends_with(".xml") {
        return Ok(bytes.to_vec());
    }

    Err(PipelineError::UnsupportedFormat(filename.to_string()))
}

fn extract_from_archive(filename: &str, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let scratch = TempDir::with_prefix("dmarc")?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    archive.extract(scratch.path())?;

    // Preferred member name: archive base name with .xml substituted
    let derived = scratch
        .path()
        .join(filename.trim_end_matches(".zip"))
        .with_extension("xml");
    if derived.is_file() {
        return Ok(std::fs::read(&derived)?);
    }

    log::debug!("XML member not defaultly named, searching {filename}");
    match find_first_xml(scratch.path())? {
        Some(path) => Ok(std::fs::read(&path)?),
        // Distinct from a walk I/O error: the archive simply holds no XML
        None => Err(PipelineError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no .xml member found in \"{filename}\""),
        ))),
    }
}

/// Tarballs carry no derivable member name, so the scan runs unconditionally.
fn extract_from_tarball(filename: &str, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let scratch = TempDir::with_prefix("dmarc")?;
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive.unpack(scratch.path())?;

    match find_first_xml(scratch.path())? {
        Some(path) => Ok(std::fs::read(&path)?),
        None => Err(PipelineError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no .xml member found in \"{filename}\""),
        ))),
    }
}

/// Short-circuiting directory walk returning the first `*.xml` file found.
fn find_first_xml(dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_first_xml(&path)? {
                return Ok(Some(found));
            }
        } else if path.extension().is_some_and(|ext| ext == "xml") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

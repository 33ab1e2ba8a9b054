//! Tar archival helpers.
//!
//! Two consumers share the same recursive walk: the final bundle archive
//! (gzip-compressed, written to disk) and the build-context stream fed to
//! the engine's build call. Entry names always use forward slashes, mode
//! bits come from the source files, and the root directory itself is never
//! emitted.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};

use crate::error::{FreightError, Result};

/// Channel capacity for the build-context stream, in chunks.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Create a gzip-compressed tar archive of a directory's contents.
pub fn create_tar_gz(src_dir: &Path, output: &Path) -> Result<()> {
    let file = File::create(output).map_err(|e| FreightError::io(output, e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_entries(&mut builder, src_dir, "", false)?;

    let encoder = builder
        .into_inner()
        .map_err(|e| FreightError::io(output, e))?;
    encoder.finish().map_err(|e| FreightError::io(output, e))?;
    Ok(())
}

/// Stream a build-context directory as an uncompressed tar.
///
/// A blocking producer task writes archive entries into a bounded channel
/// while the engine's build call drains it — the context is never buffered
/// whole in memory. Paths whose relative name begins with `.git` are
/// skipped, entire subtree included.
///
/// The returned handle yields the producer's result; await it after the
/// consumer finishes to surface walk errors.
pub fn tar_directory_stream(
    context_dir: PathBuf,
) -> (
    JoinHandle<Result<()>>,
    mpsc::Receiver<std::io::Result<Bytes>>,
) {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    let producer = task::spawn_blocking(move || {
        let writer = ChunkWriter { tx: tx.clone() };
        let mut builder = tar::Builder::new(writer);

        let result = append_entries(&mut builder, &context_dir, "", true).and_then(|()| {
            builder
                .finish()
                .map_err(|e| FreightError::io(&context_dir, e))
        });

        if let Err(ref e) = result {
            // Fail the consumer side too, so the build call aborts
            let _ = tx.blocking_send(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            )));
        }
        result
    });

    (producer, rx)
}

/// `Write` adapter that forwards chunks into an mpsc channel.
struct ChunkWriter {
    tx: mpsc::Sender<std::io::Result<Bytes>>,
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "build context consumer dropped",
                )
            })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Recursively append a directory's entries under `prefix`.
///
/// Entries are sorted by file name so archives are reproducible.
fn append_entries<W: Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    prefix: &str,
    skip_git: bool,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| FreightError::io(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| FreightError::io(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        if skip_git && rel.starts_with(".git") {
            continue;
        }

        let file_type = entry
            .file_type()
            .map_err(|e| FreightError::io(&path, e))?;

        if file_type.is_dir() {
            builder
                .append_dir(&rel, &path)
                .map_err(|e| FreightError::io(&path, e))?;
            append_entries(builder, &path, &rel, skip_git)?;
        } else {
            builder
                .append_path_with_name(&path, &rel)
                .map_err(|e| FreightError::io(&path, e))?;
        }
    }

    Ok(())
}

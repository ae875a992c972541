// WellSleuth - platform/fs.rs
//
// Bounded input reads. Files above the input ceiling are refused before any
// bytes are read; large files are memory-mapped, small ones read into a
// buffer with transient-error retries.

use crate::util::constants;
use crate::util::error::WellSleuthError;
use std::io;
use std::path::Path;
use std::time::Duration;

const MAX_RETRIES: usize = 3;
const RETRY_DELAYS_MS: [u64; MAX_RETRIES] = [50, 100, 200];

/// Raw bytes of one input file.
pub enum FileBytes {
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => &map[..],
            Self::Owned(buf) => buf.as_slice(),
        }
    }
}

impl FileBytes {
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read a file, refusing anything larger than `max_bytes`.
pub fn read_bounded(path: &Path, max_bytes: u64) -> Result<FileBytes, WellSleuthError> {
    let io_err = move |operation: &'static str| {
        move |source: io::Error| WellSleuthError::Io {
            path: path.to_path_buf(),
            operation,
            source,
        }
    };

    let size = std::fs::metadata(path).map_err(io_err("stat"))?.len();
    if size > max_bytes {
        return Err(WellSleuthError::InputTooLarge {
            path: path.to_path_buf(),
            size,
            max: max_bytes,
        });
    }

    if size >= constants::LARGE_FILE_THRESHOLD {
        let file = std::fs::File::open(path).map_err(io_err("open"))?;
        // SAFETY: the map is read-only and dropped once the run finishes.
        // Concurrent truncation of the input by another process is outside
        // what a batch conditioner can guard against.
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(io_err("map"))?;
        tracing::debug!(file = %path.display(), size, "Memory-mapped input");
        Ok(FileBytes::Mapped(map))
    } else {
        read_with_retry(path).map(FileBytes::Owned).map_err(io_err("read"))
    }
}

/// Read a small file with transient-error retries.
fn read_with_retry(path: &Path) -> io::Result<Vec<u8>> {
    let mut last_err: Option<io::Error> = None;

    for (attempt, delay) in RETRY_DELAYS_MS.iter().enumerate() {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(*delay));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

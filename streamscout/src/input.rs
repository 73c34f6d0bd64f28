//! Random-access inputs the workers read chunks from.
//!
//! Every worker reads its own byte range through a shared `Arc<dyn Input>`,
//! so implementations must support concurrent positioned reads without
//! external locking.
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::errors::{SearchError, SearchResult};

/// A finite, already-sized byte source supporting positioned reads
pub trait Input: Send + Sync {
    /// Total size in bytes
    fn size(&self) -> u64;

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; fewer than requested only at end of
    /// input. Reading at or past the end returns `Ok(0)`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Positioned reads against an open file
#[derive(Debug)]
pub struct FileInput {
    file: File,
    size: u64,
}

impl FileInput {
    /// Opens and sizes `path`
    pub fn open(path: &Path) -> SearchResult<Self> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| SearchError::from_io(path, e))?
            .len();
        debug!("Opened {} ({} bytes)", path.display(), size);
        Ok(Self { file, size })
    }
}

#[cfg(unix)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

impl Input for FileInput {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match read_file_at(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        trace!("Read {} bytes at offset {}", filled, offset);
        Ok(filled)
    }
}

/// Reads served from a read-only memory map of the file
#[derive(Debug)]
pub struct MmapInput {
    map: Mmap,
}

impl MmapInput {
    /// Maps `path` into memory
    pub fn open(path: &Path) -> SearchResult<Self> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        // SAFETY: the map is read-only; concurrent truncation of the file by
        // another process is outside what this tool supports.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(path, e))?;
        debug!("Mapped {} ({} bytes)", path.display(), map.len());
        Ok(Self { map })
    }
}

impl Input for MmapInput {
    fn size(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from(&self.map, offset, buf))
    }
}

/// An input held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryInput {
    bytes: Arc<[u8]>,
}

impl MemoryInput {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl Input for MemoryInput {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from(&self.bytes, offset, buf))
    }
}

fn copy_from(src: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= src.len() {
        return 0;
    }
    let n = buf.len().min(src.len() - start);
    buf[..n].copy_from_slice(&src[start..start + n]);
    n
}

/// Opens `path` as a shared input, memory-mapped when `use_mmap` is set
pub fn open_input(path: &Path, use_mmap: bool) -> SearchResult<Arc<dyn Input>> {
    if use_mmap {
        Ok(Arc::new(MmapInput::open(path)?))
    } else {
        Ok(Arc::new(FileInput::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_memory_input_short_read_at_end() {
        let input = MemoryInput::new(b"0123456789".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(input.size(), 10);
        assert_eq!(input.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(input.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(input.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(input.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_file_and_mmap_inputs_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.bin");
        let content: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        fs::write(&path, &content).unwrap();

        let file = FileInput::open(&path).unwrap();
        let mmap = MmapInput::open(&path).unwrap();
        assert_eq!(file.size(), 5000);
        assert_eq!(mmap.size(), 5000);

        let mut a = vec![0u8; 1024];
        let mut b = vec![0u8; 1024];
        assert_eq!(file.read_at(4500, &mut a).unwrap(), 500);
        assert_eq!(mmap.read_at(4500, &mut b).unwrap(), 500);
        assert_eq!(&a[..500], &content[4500..]);
        assert_eq!(&a[..500], &b[..500]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(matches!(
            open_input(&path, false),
            Err(SearchError::FileNotFound(_))
        ));
        assert!(matches!(
            open_input(&path, true),
            Err(SearchError::FileNotFound(_))
        ));
    }
}

//! Filesystem façade (spec §4.11), grounded in `original_source/env.go`.
//!
//! [`PosixEnv`] wraps `std::fs`. [`MemEnv`] is an in-memory
//! implementation for tests that never touches disk — the Go port has
//! no such thing; it is supplemented here per `SPEC_FULL.md` §3 so
//! table/log tests don't need a temp directory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Errors from the filesystem façade.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Propagated from the underlying OS call (or, for [`MemEnv`], a
    /// synthesized equivalent).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The named file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),
}

type Result<T> = std::result::Result<T, EnvError>;

/// A file opened for sequential, forward-only reads.
pub trait SequentialFile {
    /// Reads up to `buf.len()` bytes, returning the number actually read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Advances the read position by `n` bytes without reading them.
    fn skip(&mut self, n: u64) -> Result<()>;
}

/// A file opened for concurrent random-offset reads.
pub trait RandomAccessFile: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

/// A file opened for sequential writes.
pub trait WritableFile {
    /// Appends `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;
    /// Flushes previously written data to stable storage.
    fn sync(&mut self) -> Result<()>;
}

/// A filesystem abstraction (spec §4.11), letting the table builder,
/// table reader, and log writer/reader run against either a real
/// filesystem or an in-memory fake.
pub trait Env: Send + Sync {
    /// Opens `path` for sequential reads.
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>>;
    /// Opens `path` for random-access reads.
    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>>;
    /// Creates (truncating if it exists) `path` for writing.
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;
    /// Opens `path` for appending, creating it if it does not exist.
    fn new_appendable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;
    /// Removes `path`.
    fn delete_file(&self, path: &Path) -> Result<()>;
    /// The current size of `path` in bytes.
    fn get_file_size(&self, path: &Path) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Posix
// ---------------------------------------------------------------------------

/// The default [`Env`], backed directly by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixEnv;

impl Env for PosixEnv {
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>> {
        Ok(Box::new(PosixSequentialFile(File::open(path)?)))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        Ok(Arc::new(PosixRandomAccessFile(File::open(path)?)))
    }

    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(Box::new(PosixWritableFile(file)))
    }

    fn new_appendable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(PosixWritableFile(file)))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn get_file_size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }
}

struct PosixSequentialFile(File);

impl SequentialFile for PosixSequentialFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.0.read(buf)?)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        self.0.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }
}

struct PosixRandomAccessFile(File);

impl RandomAccessFile for PosixRandomAccessFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        Ok(self.0.read_at(buf, offset)?)
    }
}

struct PosixWritableFile(File);

impl WritableFile for PosixWritableFile {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.0.write_all(data)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.0.sync_all()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemFile {
    data: Vec<u8>,
}

/// An in-memory [`Env`] for tests (spec §4.11 "tests may supply an
/// in-memory implementation").
#[derive(Default, Clone)]
pub struct MemEnv {
    files: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<MemFile>>>>>,
}

impl MemEnv {
    /// Builds an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, path: &Path) -> Arc<Mutex<MemFile>> {
        let mut files = self.files.lock().unwrap();
        files.entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(MemFile::default()))).clone()
    }

    fn get_existing(&self, path: &Path) -> Result<Arc<Mutex<MemFile>>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| EnvError::NotFound(path.display().to_string()))
    }
}

impl Env for MemEnv {
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>> {
        Ok(Box::new(MemSequentialFile { file: self.get_existing(path)?, pos: 0 }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        Ok(Arc::new(MemRandomAccessFile { file: self.get_existing(path)? }))
    }

    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = self.get_or_create(path);
        file.lock().unwrap().data.clear();
        Ok(Box::new(MemWritableFile { file }))
    }

    fn new_appendable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        Ok(Box::new(MemWritableFile { file: self.get_or_create(path) }))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn get_file_size(&self, path: &Path) -> Result<u64> {
        Ok(self.get_existing(path)?.lock().unwrap().data.len() as u64)
    }
}

struct MemSequentialFile {
    file: Arc<Mutex<MemFile>>,
    pos: usize,
}

impl SequentialFile for MemSequentialFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.lock().unwrap();
        let remaining = file.data.len().saturating_sub(self.pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&file.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        self.pos += n as usize;
        Ok(())
    }
}

struct MemRandomAccessFile {
    file: Arc<Mutex<MemFile>>,
}

impl RandomAccessFile for MemRandomAccessFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.lock().unwrap();
        let offset = offset as usize;
        if offset >= file.data.len() {
            return Ok(0);
        }
        let n = (file.data.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&file.data[offset..offset + n]);
        Ok(n)
    }
}

struct MemWritableFile {
    file: Arc<Mutex<MemFile>>,
}

impl WritableFile for MemWritableFile {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.lock().unwrap().data.extend_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_env_write_then_read_round_trips() {
        let env = MemEnv::new();
        let path = Path::new("/table.sst");
        {
            let mut w = env.new_writable_file(path).unwrap();
            w.write(b"hello world").unwrap();
            w.sync().unwrap();
        }
        assert_eq!(env.get_file_size(path).unwrap(), 11);

        let mut buf = [0u8; 5];
        let reader = env.new_random_access_file(path).unwrap();
        let n = reader.read_at(6, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[test]
    fn mem_env_sequential_file_reads_in_order() {
        let env = MemEnv::new();
        let path = Path::new("/log");
        env.new_writable_file(path).unwrap().write(b"abcdef").unwrap();

        let mut seq = env.new_sequential_file(path).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(seq.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(seq.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"def");
        assert_eq!(seq.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let env = MemEnv::new();
        let err = env.new_sequential_file(Path::new("/missing")).unwrap_err();
        assert!(matches!(err, EnvError::NotFound(_)));
    }

    #[test]
    fn delete_file_removes_it() {
        let env = MemEnv::new();
        let path = Path::new("/a");
        env.new_writable_file(path).unwrap().write(b"x").unwrap();
        env.delete_file(path).unwrap();
        assert!(env.new_sequential_file(path).is_err());
    }
}

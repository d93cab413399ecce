#![allow(unsafe_code)] // mapping a file is inherently a raw-memory contract

use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

// Thin wrapper over the platform memory-mapping primitives with the two
// shapes the engine needs: read-only maps of existing files, and read-write
// maps of freshly created files at a caller-chosen size. Zero-length files
// are represented without a mapping, since the platforms refuse empty maps.
//
// Safety note on the `unsafe` map calls: the mapped files are private to a
// single operation by contract (the output is create-new, the input is the
// user's own file). A concurrent writer to the input would at worst corrupt
// that one operation's ciphertext, which the MAC then rejects.


/// Why a map operation failed, alongside the underlying I/O error.
#[derive(Debug)]
pub(crate) enum MapError {
    /// Create-new semantics refused: the file already exists.
    Exists,
    /// Opening or creating the file failed.
    Open(io::Error),
    /// Sizing the new file failed.
    Size(io::Error),
    /// The map syscall itself failed.
    Map(io::Error),
    /// Flushing dirty pages failed.
    Sync(io::Error),
}

impl MapError {
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            MapError::Exists => io::Error::new(io::ErrorKind::AlreadyExists, "file exists"),
            MapError::Open(e) | MapError::Size(e) | MapError::Map(e) | MapError::Sync(e) => e,
        }
    }
}


/// A read-only map of an existing input file.
#[derive(Debug)]
pub(crate) struct InputMap {
    map: Option<Mmap>,
}

impl InputMap {
    /// Maps the file at `path`, which must already exist.
    pub(crate) fn open(path: &Path) -> Result<Self, MapError> {
        let file = File::open(path).map_err(MapError::Open)?;
        let len = file.metadata().map_err(MapError::Open)?.len();
        if len == 0 {
            return Ok(Self { map: None });
        }
        let map = unsafe { Mmap::map(&file) }.map_err(MapError::Map)?;
        Ok(Self { map: Some(map) })
    }

    /// The mapped bytes; empty for a zero-length file.
    pub(crate) fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}


/// A read-write map of a newly created output file.
///
/// Creation uses create-new semantics: a pre-existing file at the path is an
/// error, never overwritten. The fresh file is extended to its final size
/// before mapping, so the mapped bytes start out all zero.
#[derive(Debug)]
pub(crate) struct OutputMap {
    map: Option<MmapMut>,
    _file: File,
}

impl OutputMap {
    /// Creates the file at `path` with exactly `size` bytes and maps it.
    pub(crate) fn create(path: &Path, size: u64) -> Result<Self, MapError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    MapError::Exists
                } else {
                    MapError::Open(e)
                }
            })?;
        file.set_len(size).map_err(MapError::Size)?;
        let map = if size == 0 {
            None
        } else {
            Some(unsafe { MmapMut::map_mut(&file) }.map_err(MapError::Map)?)
        };
        Ok(Self { map, _file: file })
    }

    /// The mapped bytes.
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.map.as_deref_mut().unwrap_or(&mut [])
    }

    /// Synchronizes dirty pages to disk.
    pub(crate) fn sync(&self) -> Result<(), MapError> {
        if let Some(map) = &self.map {
            map.flush().map_err(MapError::Sync)?;
        }
        Ok(())
    }
}

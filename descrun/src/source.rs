use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use memmap2::Mmap;

const READ_CHUNK: usize = 1 << 20;

/// Callback receiving `(loaded, total)` byte counts.
pub type FetchProgress<'a> = Option<&'a mut dyn FnMut(u64, u64)>;

/// Bytes fetched from a [`ByteSource`].
#[derive(Debug)]
pub enum Blob {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Blob::Owned(bytes) => bytes,
            Blob::Mapped(mmap) => mmap,
        }
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob::Owned(bytes)
    }
}

/// Generic byte fetch keyed by resource name.
pub trait ByteSource {
    fn fetch(&self, name: &str, progress: FetchProgress<'_>) -> Result<Blob>;
}

/// Resources stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    mmap: bool,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mmap: true,
        }
    }

    /// Read files in chunks instead of mapping them, reporting progress per chunk.
    pub fn buffered(mut self) -> Self {
        self.mmap = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ByteSource for DirectorySource {
    fn fetch(&self, name: &str, mut progress: FetchProgress<'_>) -> Result<Blob> {
        let path = self.root.join(name);
        let mut file =
            File::open(&path).with_context(|| format!("{} cannot be loaded", path.display()))?;
        let total = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();

        // Empty files cannot be mapped on every platform.
        if self.mmap && total > 0 {
            let mmap = unsafe { Mmap::map(&file) }
                .with_context(|| format!("mmap {}", path.display()))?;
            if let Some(callback) = progress.as_deref_mut() {
                callback(total, total);
            }
            return Ok(Blob::Mapped(mmap));
        }
        let bytes = read_chunked(&mut file, total, progress)
            .with_context(|| format!("read {}", path.display()))?;
        Ok(Blob::Owned(bytes))
    }
}

/// Read `reader` to the end in fixed-size chunks, reporting `(loaded, total)`
/// after each one. `total` is the expected size and only sizes the initial
/// reservation; a reservation that cannot be satisfied is an error.
pub fn read_chunked<R: Read>(
    mut reader: R,
    total: u64,
    mut progress: FetchProgress<'_>,
) -> Result<Vec<u8>> {
    let capacity = usize::try_from(total)
        .with_context(|| format!("resource of {} bytes exceeds the address space", total))?;
    let mut bytes = Vec::<u8>::new();
    bytes
        .try_reserve_exact(capacity)
        .with_context(|| format!("reserve {} bytes", total))?;
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).context("read resource")?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(callback) = progress.as_deref_mut() {
            callback(bytes.len() as u64, total);
        }
    }
    Ok(bytes)
}

/// Resources already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    resources: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.resources.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self, name: &str, progress: FetchProgress<'_>) -> Result<Blob> {
        let bytes = self
            .resources
            .get(name)
            .ok_or_else(|| anyhow!("{} cannot be loaded", name))?;
        if let Some(callback) = progress {
            callback(bytes.len() as u64, bytes.len() as u64);
        }
        Ok(Blob::Owned(bytes.clone()))
    }
}

//! Raw byte streams that tags are written to and read from.
//!
//! Three backings share the [`ByteStream`] interface: an in-memory buffer ([`MemoryStream`]), a
//! plain file ([`FileStream`]), and a named chunk inside a package
//! ([`ChunkWriter`][crate::package::ChunkWriter] / [`ChunkReader`][crate::package::ChunkReader]).
//!
//! Writes never return an error. The first failure is recorded and every later write becomes a
//! no-op, so a long run of writes only needs one check at the end, from [`ByteStream::finish`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

pub trait ByteStream {
    /// Append bytes. A failure is recorded and reported by [`finish`][ByteStream::finish].
    fn write(&mut self, bytes: &[u8]);

    /// Read exactly `n` bytes.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>>;

    fn read_byte(&mut self) -> Result<u8> {
        let bytes = self.read_exact(1)?;
        Ok(bytes[0])
    }

    /// True when there is nothing left to read.
    fn at_eof(&mut self) -> bool;

    /// Skip `n` bytes without materializing them.
    fn advance(&mut self, n: usize) -> Result<()>;

    /// Flush anything pending and report the first write failure, if there was one.
    fn finish(&mut self) -> Result<()>;
}

/// An in-memory byte buffer. Writes append to the end; reads consume from the front.
#[derive(Clone, Debug, Default)]
pub struct MemoryStream {
    buf: Vec<u8>,
    pos: usize,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl ByteStream for MemoryStream {
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        if n > self.remaining() {
            return Err(Error::ShortRead {
                step: "read from memory stream",
                actual: self.remaining(),
                expected: n,
            });
        }
        let out = self.buf[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn at_eof(&mut self) -> bool {
        self.remaining() == 0
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::ShortRead {
                step: "skip in memory stream",
                actual: self.remaining(),
                expected: n,
            });
        }
        self.pos += n;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum FileInner {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// A plain file, opened either for writing ([`FileStream::create`]) or for reading
/// ([`FileStream::open`]).
#[derive(Debug)]
pub struct FileStream {
    path: PathBuf,
    inner: FileInner,
    error: Option<io::Error>,
}

impl FileStream {
    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "Opened save file for writing");
        Ok(Self {
            path,
            inner: FileInner::Writer(BufWriter::new(file)),
            error: None,
        })
    }

    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!(path = %path.display(), "Opened save file for reading");
        Ok(Self {
            path,
            inner: FileInner::Reader(BufReader::new(file)),
            error: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&mut self) -> Result<&mut BufReader<File>> {
        match self.inner {
            FileInner::Reader(ref mut r) => Ok(r),
            FileInner::Writer(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "save file was opened for writing",
            ))),
        }
    }
}

fn map_read_err(e: io::Error, step: &'static str, expected: usize) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::ShortRead {
            step,
            actual: 0,
            expected,
        }
    } else {
        Error::Io(e)
    }
}

impl ByteStream for FileStream {
    fn write(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let result = match self.inner {
            FileInner::Writer(ref mut w) => w.write_all(bytes),
            FileInner::Reader(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "save file was opened for reading",
            )),
        };
        if let Err(e) = result {
            debug!(path = %self.path.display(), error = %e, "Write failed; ignoring further writes");
            self.error = Some(e);
        }
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let reader = self.reader()?;
        let mut buf = vec![0u8; n];
        reader
            .read_exact(&mut buf)
            .map_err(|e| map_read_err(e, "read from file", n))?;
        Ok(buf)
    }

    fn at_eof(&mut self) -> bool {
        match self.inner {
            FileInner::Reader(ref mut r) => r.fill_buf().map(|b| b.is_empty()).unwrap_or(true),
            FileInner::Writer(_) => true,
        }
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        let reader = self.reader()?;
        let skipped = io::copy(&mut reader.by_ref().take(n as u64), &mut io::sink())?;
        if skipped < n as u64 {
            return Err(Error::ShortRead {
                step: "skip in file",
                actual: skipped as usize,
                expected: n,
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(Error::Io(e));
        }
        if let FileInner::Writer(ref mut w) = self.inner {
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        Ok(())
    }
}

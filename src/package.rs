//! A container file holding named chunks, one save per package.
//!
//! Layout on disk, all integers big-endian:
//!
//! ```text
//! [magic: u32 "TSAV"][format: u8][pad: 3 bytes][directory offset: u32]
//! [chunk bytes ...]
//! [directory: count u32, then per chunk: name len u8, name, start u32, len u32]
//! ```
//!
//! Opening a package reads the header and the directory, nothing else. A chunk's bytes come off
//! the disk only when a reader is opened for it, so listing saves never touches the state chunks,
//! and a damaged directory entry breaks only the chunk it points at.
//!
//! Chunk writes land in memory and become visible to readers of the same `Package` once the
//! [`ChunkWriter`] is finished. Nothing reaches the disk until [`Package::commit`], which writes
//! a sibling temporary file and renames it over the package. A crash at any moment leaves the
//! package exactly as it was at the last commit.
//!
//! A writable package holds an exclusive OS lock on a `.lock` file next to it for as long as it
//! is open. The OS drops the lock when the process exits, crashed or not.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use byteorder::{BigEndian, ReadBytesExt};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::stream::ByteStream;

const PACKAGE_MAGIC: u32 = 0x5453_4156; // "TSAV"
const PACKAGE_FORMAT: u8 = 1;
const HEADER_LEN: usize = 12;

/// Chunk names fit the fixed-width name slot of the original directory entry.
pub const MAX_CHUNK_NAME: usize = 8;

fn chunk_name_regex() -> Result<&'static Regex> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"^[A-Za-z0-9._-]{1,8}$")
        .map_err(|e| Error::Format(format!("chunk name pattern: {}", e)))?;
    Ok(RE.get_or_init(|| re))
}

fn check_chunk_name(name: &str) -> Result<()> {
    if chunk_name_regex()?.is_match(name) {
        Ok(())
    } else {
        Err(Error::Format(format!(
            "invalid chunk name {:?}: expected 1 to {} characters from [A-Za-z0-9._-]",
            name, MAX_CHUNK_NAME
        )))
    }
}

/// Where a committed chunk sits in the package file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Extent {
    start: u32,
    len: u32,
}

#[derive(Debug)]
enum Chunk {
    /// Committed and still on disk.
    Stored(Extent),
    /// Written since the last commit.
    Written(Vec<u8>),
}

#[derive(Debug)]
struct Directory {
    /// Offset of the directory, and so the end of the chunk area.
    chunk_end: usize,
    entries: BTreeMap<String, Extent>,
}

#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    file: Option<File>,
    chunk_end: usize,
    chunks: BTreeMap<String, Chunk>,
    dirty: bool,
    lock: Option<File>,
}

impl Package {
    /// Create a new, empty package at `path`, replacing whatever is there at the next commit.
    pub fn create(path: impl AsRef<Path>) -> Result<Package> {
        let path = path.as_ref().to_path_buf();
        let lock = acquire_lock(&path)?;
        debug!(path = %path.display(), "Created empty package");
        Ok(Package {
            path,
            file: None,
            chunk_end: HEADER_LEN,
            chunks: BTreeMap::new(),
            dirty: true,
            lock: Some(lock),
        })
    }

    /// Open an existing package for reading only.
    pub fn open(path: impl AsRef<Path>) -> Result<Package> {
        let path = path.as_ref().to_path_buf();
        let (file, dir) = open_file(&path)?;
        Ok(Package {
            path,
            file: Some(file),
            chunk_end: dir.chunk_end,
            chunks: stored_chunks(dir),
            dirty: false,
            lock: None,
        })
    }

    /// Open an existing package for reading and writing.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Package> {
        let path = path.as_ref().to_path_buf();
        let lock = acquire_lock(&path)?;
        let (file, dir) = open_file(&path)?;
        Ok(Package {
            path,
            file: Some(file),
            chunk_end: dir.chunk_end,
            chunks: stored_chunks(dir),
            dirty: false,
            lock: Some(lock),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "package was opened read-only",
            )))
        }
    }

    /// Start writing a chunk. The chunk replaces any existing one of the same name once the
    /// writer is finished; dropping the writer unfinished discards it.
    pub fn writer(&mut self, name: &str) -> Result<ChunkWriter<'_>> {
        check_chunk_name(name)?;
        self.check_writable()?;
        Ok(ChunkWriter {
            package: self,
            name: name.to_string(),
            buf: Vec::new(),
            error: None,
            finished: false,
        })
    }

    /// Open a chunk for reading. Committed chunks are read from disk here, and only this one.
    pub fn reader(&self, name: &str) -> Result<ChunkReader<'_>> {
        let data = match self.chunks.get(name) {
            None => return Err(Error::MissingChunk(name.to_string())),
            Some(Chunk::Written(data)) => Cow::Borrowed(&data[..]),
            Some(Chunk::Stored(extent)) => Cow::Owned(self.read_stored(name, *extent)?),
        };
        Ok(ChunkReader { data, pos: 0 })
    }

    fn read_stored(&self, name: &str, extent: Extent) -> Result<Vec<u8>> {
        let mut file = match self.file {
            Some(ref file) => file,
            None => return Err(Error::MissingChunk(name.to_string())),
        };
        read_extent(&mut file, name, extent, self.chunk_end)
    }

    pub fn has_chunk(&self, name: &str) -> bool {
        self.chunks.contains_key(name)
    }

    /// Names of all chunks, sorted.
    pub fn list_chunks(&self) -> Vec<String> {
        self.chunks.keys().cloned().collect()
    }

    pub fn delete_chunk(&mut self, name: &str) -> Result<()> {
        self.check_writable()?;
        if self.chunks.remove(name).is_none() {
            return Err(Error::MissingChunk(name.to_string()));
        }
        self.dirty = true;
        Ok(())
    }

    /// Write every finished chunk to disk atomically.
    pub fn commit(&mut self) -> Result<()> {
        self.check_writable()?;
        if !self.dirty {
            return Ok(());
        }
        let mut contents = BTreeMap::new();
        for (name, chunk) in self.chunks.iter() {
            let data = match chunk {
                Chunk::Written(data) => Cow::Borrowed(&data[..]),
                Chunk::Stored(extent) => Cow::Owned(self.read_stored(name, *extent)?),
            };
            contents.insert(name.as_str(), data);
        }
        let encoded = encode_package(&contents)?;
        drop(contents);

        let tmp = sibling(&self.path, "tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        // Everything now lives in the new file
        let (file, dir) = open_file(&self.path)?;
        self.chunk_end = dir.chunk_end;
        self.chunks = stored_chunks(dir);
        self.file = Some(file);
        self.dirty = false;
        info!(
            path = %self.path.display(),
            chunks = self.chunks.len(),
            bytes = encoded.len(),
            "Committed package"
        );
        Ok(())
    }

    /// Drop every change since the last commit and close the package.
    pub fn abort(self) {
        if self.dirty {
            debug!(path = %self.path.display(), "Aborting package with uncommitted changes");
        }
    }
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

fn acquire_lock(path: &Path) -> Result<File> {
    let lock_path = sibling(path, "lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)?;
    fs2::FileExt::try_lock_exclusive(&file).map_err(|e| {
        warn!(path = %path.display(), "Package is already open for writing");
        Error::Io(e)
    })?;
    Ok(file)
}

fn open_file(path: &Path) -> Result<(File, Directory)> {
    let mut file = File::open(path)?;
    let dir = read_directory(&mut file)?;
    debug!(path = %path.display(), chunks = dir.entries.len(), "Loaded package directory");
    Ok((file, dir))
}

fn stored_chunks(dir: Directory) -> BTreeMap<String, Chunk> {
    dir.entries
        .into_iter()
        .map(|(name, extent)| (name, Chunk::Stored(extent)))
        .collect()
}

fn encode_package<D: AsRef<[u8]>>(chunks: &BTreeMap<&str, D>) -> Result<Vec<u8>> {
    let body_len: usize = chunks.values().map(|c| c.as_ref().len()).sum();
    let dir_offset = HEADER_LEN + body_len;
    if dir_offset > u32::MAX as usize {
        return Err(Error::LengthTooLong {
            max: u32::MAX as usize,
            actual: dir_offset,
        });
    }

    let mut buf = Vec::with_capacity(dir_offset + 16 * chunks.len() + 4);
    buf.extend_from_slice(&PACKAGE_MAGIC.to_be_bytes());
    buf.push(PACKAGE_FORMAT);
    buf.extend_from_slice(&[0u8; 3]);
    buf.extend_from_slice(&(dir_offset as u32).to_be_bytes());

    let mut directory = Vec::new();
    directory.extend_from_slice(&(chunks.len() as u32).to_be_bytes());
    for (name, data) in chunks {
        let data = data.as_ref();
        let start = buf.len() as u32;
        buf.extend_from_slice(data);
        directory.push(name.len() as u8);
        directory.extend_from_slice(name.as_bytes());
        directory.extend_from_slice(&start.to_be_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }
    buf.extend_from_slice(&directory);
    Ok(buf)
}

fn short(step: &'static str, actual: usize, expected: usize) -> Error {
    Error::ShortRead {
        step,
        actual,
        expected,
    }
}

/// Read the header and the directory. Chunk extents are not checked here; a bad one is only an
/// error once something asks for that chunk.
fn read_directory<R: Read + Seek>(r: &mut R) -> Result<Directory> {
    let total = r.seek(SeekFrom::End(0))? as usize;
    r.seek(SeekFrom::Start(0))?;
    if total < HEADER_LEN {
        return Err(short("package header", total, HEADER_LEN));
    }
    let mut raw = [0u8; HEADER_LEN];
    r.read_exact(&mut raw)?;
    let mut header = &raw[..];
    let magic = header.read_u32::<BigEndian>()?;
    if magic != PACKAGE_MAGIC {
        return Err(Error::Format(format!("not a save package (magic 0x{:08x})", magic)));
    }
    let format = header.read_u8()?;
    if format != PACKAGE_FORMAT {
        return Err(Error::Format(format!("unknown package format {}", format)));
    }
    header = &header[3..];
    let dir_offset = header.read_u32::<BigEndian>()? as usize;
    if dir_offset < HEADER_LEN || dir_offset > total {
        return Err(Error::Format(format!(
            "directory offset {} outside of package ({} bytes)",
            dir_offset, total
        )));
    }

    r.seek(SeekFrom::Start(dir_offset as u64))?;
    let mut dir = Vec::with_capacity(total - dir_offset);
    r.read_to_end(&mut dir)?;
    Ok(Directory {
        chunk_end: dir_offset,
        entries: decode_directory(&dir)?,
    })
}

fn decode_directory(mut dir: &[u8]) -> Result<BTreeMap<String, Extent>> {
    let count = dir
        .read_u32::<BigEndian>()
        .map_err(|_| short("directory count", dir.len(), 4))? as usize;
    // Each entry takes at least 10 bytes
    if count > dir.len() / 10 {
        return Err(Error::Format(format!(
            "directory claims {} chunks in {} bytes",
            count,
            dir.len()
        )));
    }

    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let name_len = dir
            .read_u8()
            .map_err(|_| short("chunk name length", 0, 1))? as usize;
        if name_len > dir.len() {
            return Err(short("chunk name", dir.len(), name_len));
        }
        let (name, rest) = dir.split_at(name_len);
        dir = rest;
        let name = std::str::from_utf8(name)
            .map_err(|e| Error::Format(format!("chunk name: {}", e)))?
            .to_string();
        check_chunk_name(&name)?;
        let start = dir
            .read_u32::<BigEndian>()
            .map_err(|_| short("chunk start", dir.len(), 4))?;
        let len = dir
            .read_u32::<BigEndian>()
            .map_err(|_| short("chunk length", dir.len(), 4))?;
        if entries.insert(name.clone(), Extent { start, len }).is_some() {
            return Err(Error::Format(format!("chunk [{}] listed twice", name)));
        }
    }
    if !dir.is_empty() {
        return Err(Error::Format(format!(
            "{} trailing bytes after package directory",
            dir.len()
        )));
    }
    Ok(entries)
}

fn read_extent<R: Read + Seek>(
    r: &mut R,
    name: &str,
    extent: Extent,
    chunk_end: usize,
) -> Result<Vec<u8>> {
    let start = extent.start as usize;
    let end = start + extent.len as usize;
    if start < HEADER_LEN || end > chunk_end {
        return Err(Error::Format(format!(
            "chunk [{}] at {}..{} lies outside the chunk area",
            name, start, end
        )));
    }
    r.seek(SeekFrom::Start(extent.start as u64))?;
    let mut buf = vec![0u8; extent.len as usize];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            short("read chunk", 0, extent.len as usize)
        } else {
            Error::Io(e)
        }
    })?;
    Ok(buf)
}

/// Writes one chunk. Call [`finish`][ByteStream::finish] to store it in the package; calling it
/// again does nothing.
#[derive(Debug)]
pub struct ChunkWriter<'p> {
    package: &'p mut Package,
    name: String,
    buf: Vec<u8>,
    error: Option<Error>,
    finished: bool,
}

impl<'p> ChunkWriter<'p> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<'p> ByteStream for ChunkWriter<'p> {
    fn write(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if self.finished {
            self.error = Some(Error::Format(format!(
                "write to chunk [{}] after it was finished",
                self.name
            )));
            return;
        }
        let len = self.buf.len() + bytes.len();
        if len > u32::MAX as usize {
            self.error = Some(Error::LengthTooLong {
                max: u32::MAX as usize,
                actual: len,
            });
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        Err(Error::ShortRead {
            step: "read from chunk writer",
            actual: 0,
            expected: n,
        })
    }

    fn at_eof(&mut self) -> bool {
        true
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        self.read_exact(n).map(|_| ())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let data = std::mem::take(&mut self.buf);
        debug!(chunk = %self.name, len = data.len(), "Finished chunk");
        self.package
            .chunks
            .insert(self.name.clone(), Chunk::Written(data));
        self.package.dirty = true;
        Ok(())
    }
}

/// Reads one chunk out of an open package.
#[derive(Clone, Debug)]
pub struct ChunkReader<'p> {
    data: Cow<'p, [u8]>,
    pos: usize,
}

impl<'p> ChunkReader<'p> {
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl<'p> ByteStream for ChunkReader<'p> {
    fn write(&mut self, _bytes: &[u8]) {
        warn!("Ignoring write to a chunk reader");
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        if n > self.remaining() {
            return Err(Error::ShortRead {
                step: "read from chunk",
                actual: self.remaining(),
                expected: n,
            });
        }
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn at_eof(&mut self) -> bool {
        self.remaining() == 0
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::ShortRead {
                step: "skip in chunk",
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

#[cfg(test)]
mod test {
    use super::*;

    fn write_chunk(package: &mut Package, name: &str, data: &[u8]) {
        let mut w = package.writer(name).unwrap();
        w.write(data);
        w.finish().unwrap();
    }

    fn read_all(package: &Package, name: &str) -> Vec<u8> {
        let mut r = package.reader(name).unwrap();
        let n = r.remaining();
        r.read_exact(n).unwrap()
    }

    #[test]
    fn commit_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.tsav");
        {
            let mut package = Package::create(&path).unwrap();
            write_chunk(&mut package, "chr", b"summary");
            write_chunk(&mut package, "you", b"lots of player state");
            write_chunk(&mut package, "empty", b"");
            package.commit().unwrap();
            // Readable from the new file straight after the commit
            assert_eq!(read_all(&package, "chr"), b"summary".to_vec());
        }

        let package = Package::open(&path).unwrap();
        assert!(!package.is_writable());
        assert_eq!(package.list_chunks(), vec!["chr", "empty", "you"]);
        let mut r = package.reader("you").unwrap();
        assert_eq!(r.read_exact(4).unwrap(), b"lots".to_vec());
        r.advance(1).unwrap();
        assert_eq!(r.remaining(), 15);
        let mut r = package.reader("empty").unwrap();
        assert!(r.at_eof());
        assert!(matches!(package.reader("lvl"), Err(Error::MissingChunk(_))));
    }

    #[test]
    fn recommit_keeps_stored_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.tsav");
        {
            let mut package = Package::create(&path).unwrap();
            write_chunk(&mut package, "chr", b"summary");
            write_chunk(&mut package, "you", b"player");
            package.commit().unwrap();
        }
        {
            let mut package = Package::open_rw(&path).unwrap();
            write_chunk(&mut package, "lvl", b"level");
            write_chunk(&mut package, "you", b"player, later");
            package.commit().unwrap();
        }
        let package = Package::open(&path).unwrap();
        assert_eq!(read_all(&package, "chr"), b"summary".to_vec());
        assert_eq!(read_all(&package, "you"), b"player, later".to_vec());
        assert_eq!(read_all(&package, "lvl"), b"level".to_vec());
    }

    #[test]
    fn unfinished_writer_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = Package::create(dir.path().join("a.tsav")).unwrap();
        {
            let mut w = package.writer("you").unwrap();
            w.write(b"half a save");
        }
        assert!(!package.has_chunk("you"));
        write_chunk(&mut package, "you", b"whole");
        assert!(package.has_chunk("you"));
    }

    #[test]
    fn finish_twice_keeps_the_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = Package::create(dir.path().join("a.tsav")).unwrap();
        {
            let mut w = package.writer("you").unwrap();
            w.write(b"data");
            w.finish().unwrap();
            w.finish().unwrap();
        }
        assert_eq!(read_all(&package, "you"), b"data".to_vec());
    }

    #[test]
    fn write_after_finish_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = Package::create(dir.path().join("a.tsav")).unwrap();
        {
            let mut w = package.writer("you").unwrap();
            w.write(b"data");
            w.finish().unwrap();
            w.write(b"more");
            assert!(matches!(w.finish(), Err(Error::Format(_))));
        }
        assert_eq!(read_all(&package, "you"), b"data".to_vec());
    }

    #[test]
    fn uncommitted_changes_are_not_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tsav");
        {
            let mut package = Package::create(&path).unwrap();
            write_chunk(&mut package, "you", b"first");
            package.commit().unwrap();
        }
        {
            let mut package = Package::open_rw(&path).unwrap();
            write_chunk(&mut package, "you", b"second");
            package.delete_chunk("you").unwrap();
            write_chunk(&mut package, "lvl", b"level");
            package.abort();
        }
        let package = Package::open(&path).unwrap();
        assert_eq!(package.list_chunks(), vec!["you"]);
        assert_eq!(read_all(&package, "you"), b"first".to_vec());
    }

    #[test]
    fn one_writer_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tsav");
        let first = Package::create(&path).unwrap();
        assert!(matches!(Package::create(&path), Err(Error::Io(_))));
        drop(first);
        let second = Package::create(&path);
        assert!(second.is_ok(), "lock should be released on drop");
    }

    #[test]
    fn leftover_lock_file_does_not_block() {
        // A crashed writer leaves the lock file behind, but not the lock
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tsav");
        fs::write(sibling(&path, "lock"), b"").unwrap();
        {
            let mut package = Package::create(&path).unwrap();
            write_chunk(&mut package, "you", b"x");
            package.commit().unwrap();
        }
        assert!(sibling(&path, "lock").exists());
        assert!(Package::open_rw(&path).is_ok());
    }

    #[test]
    fn read_only_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tsav");
        {
            let mut package = Package::create(&path).unwrap();
            write_chunk(&mut package, "you", b"x");
            package.commit().unwrap();
        }
        let mut package = Package::open(&path).unwrap();
        assert!(package.writer("you").is_err());
        assert!(package.delete_chunk("you").is_err());
        assert!(package.commit().is_err());
    }

    #[test]
    fn chunk_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = Package::create(dir.path().join("a.tsav")).unwrap();
        assert!(package.writer("").is_err());
        assert!(package.writer("waytoolong").is_err());
        assert!(package.writer("bad name").is_err());
        assert!(package.writer("lvl-D.3").is_ok());
    }

    fn encoded(chunks: &[(&'static str, &'static [u8])]) -> Vec<u8> {
        let map: BTreeMap<&str, &[u8]> = chunks.iter().copied().collect();
        encode_package(&map).unwrap()
    }

    #[test]
    fn corrupt_directories() {
        let good = encoded(&[("you", b"abc")]);
        let dir = read_directory(&mut io::Cursor::new(&good)).unwrap();
        assert_eq!(dir.chunk_end, HEADER_LEN + 3);
        assert_eq!(
            dir.entries.get("you"),
            Some(&Extent {
                start: HEADER_LEN as u32,
                len: 3
            })
        );

        // The directory sits at the end, so every truncation cuts into it
        for cut in 0..good.len() {
            assert!(
                read_directory(&mut io::Cursor::new(&good[..cut])).is_err(),
                "cut at {}",
                cut
            );
        }

        let mut bad_magic = good.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(
            read_directory(&mut io::Cursor::new(&bad_magic)),
            Err(Error::Format(_))
        ));

        let mut huge_count = good.clone();
        let at = HEADER_LEN + 3;
        huge_count[at..at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            read_directory(&mut io::Cursor::new(&huge_count)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn bad_extent_is_found_on_read() {
        let mut bytes = encoded(&[("you", b"abc")]);
        let len_at = bytes.len() - 4;
        bytes[len_at..].copy_from_slice(&100u32.to_be_bytes());
        let mut cursor = io::Cursor::new(&bytes);
        let dir = read_directory(&mut cursor).unwrap();
        let extent = dir.entries["you"];
        assert!(matches!(
            read_extent(&mut cursor, "you", extent, dir.chunk_end),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn damaged_entry_breaks_only_its_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tsav");
        // Entries are sorted by name, so the last 4 bytes are the length of "you"
        let mut bytes = encoded(&[("chr", b"summary"), ("you", b"state")]);
        let len_at = bytes.len() - 4;
        bytes[len_at..].copy_from_slice(&0x00ff_ffffu32.to_be_bytes());
        fs::write(&path, &bytes).unwrap();

        let package = Package::open(&path).unwrap();
        assert_eq!(package.list_chunks(), vec!["chr", "you"]);
        assert_eq!(read_all(&package, "chr"), b"summary".to_vec());
        assert!(matches!(package.reader("you"), Err(Error::Format(_))));
    }
}

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Random-access reads at a byte offset, as the sender needs to (re)send an
/// arbitrary chunk id. Out of the core's scope per the spec; the core is
/// generic over this trait rather than over a concrete file type.
pub trait ChunkSource: Send {
    /// Reads up to `buf.len()` bytes starting at `offset`, returning the
    /// number of bytes actually read (`0` only at end of file).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Random-access writes at a byte offset, as the receiver needs to place
/// chunks that may arrive out of order. Out of the core's scope per the
/// spec; the core is generic over this trait rather than over a concrete
/// file type.
pub trait ChunkSink: Send {
    /// Writes `data` starting at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Flushes any buffered writes to durable storage.
    fn flush(&mut self) -> io::Result<()>;
}

/// A [`ChunkSource`] backed by a real, already-opened file.
pub struct FileChunkSource {
    file: File,
}

impl FileChunkSource {
    /// Opens `path` read-only for use as a chunk source.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Size of the underlying file, in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl ChunkSource for FileChunkSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }
}

/// A [`ChunkSink`] backed by a real file, opened binary+truncate.
pub struct FileChunkSink {
    file: File,
}

impl FileChunkSink {
    /// Opens (creating, truncating) `path` for use as a chunk sink.
    pub fn create_truncated(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl ChunkSink for FileChunkSink {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! An in-memory [`ChunkSource`]/[`ChunkSink`] pair for unit tests.

    use super::{ChunkSink, ChunkSource};
    use std::io;

    /// A `ChunkSource` backed by an in-memory byte vector.
    pub struct MemorySource {
        data: Vec<u8>,
    }

    impl MemorySource {
        /// Wraps `data` as a chunk source.
        pub fn new(data: Vec<u8>) -> Self {
            Self { data }
        }
    }

    impl ChunkSource for MemorySource {
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            let offset = offset as usize;
            if offset >= self.data.len() {
                return Ok(0);
            }
            let available = &self.data[offset..];
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            Ok(n)
        }
    }

    /// A `ChunkSink` backed by an in-memory byte vector, growing as needed.
    #[derive(Default)]
    pub struct MemorySink {
        data: Vec<u8>,
    }

    impl MemorySink {
        /// The bytes written so far.
        pub fn into_inner(self) -> Vec<u8> {
            self.data
        }

        /// The bytes written so far, without consuming the sink.
        pub fn as_slice(&self) -> &[u8] {
            &self.data
        }
    }

    impl ChunkSink for MemorySink {
        fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
            let offset = offset as usize;
            let end = offset + data.len();
            if self.data.len() < end {
                self.data.resize(end, 0);
            }
            self.data[offset..end].copy_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

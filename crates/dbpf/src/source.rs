//! The byte source shared by every resource of an open package.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};

#[derive(Debug)]
pub(crate) enum ByteSource {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl ByteSource {
    /// Reads exactly `len` bytes starting at `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0; len];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File(r) => r.read(buf),
            ByteSource::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::File(r) => r.seek(pos),
            ByteSource::Memory(r) => r.seek(pos),
        }
    }
}

//! The append-only operation log behind [`super::Db`].
//!
//! Layout: a fixed header `[magic u32][version u16]` followed by frames
//! of `[len u32][crc64 u64][payload]`, all big endian, where the
//! payload is a bincode-encoded [`LogEntry`]. A frame with `value:
//! None` is a tombstone. The CRC is CRC-64/ECMA over the payload.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};

use crate::errdata;
use crate::error::{Error, Result};

const MAGIC: u32 = 0x4b4c_4f47; // "KLOG"
const VERSION: u16 = 1;
const HEADER_SIZE: u64 = 6;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// One logged operation. A missing value deletes the key.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct Log {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl Log {
    /// Opens the log at path, creating it if absent, and positions for
    /// appending. `buffer_size` sizes the write buffer.
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let mut file = File::options()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_u32::<BigEndian>(MAGIC)?;
            file.write_u16::<BigEndian>(VERSION)?;
            file.sync_all()?;
        } else {
            if len < HEADER_SIZE {
                return Err(errdata!("log file {} is shorter than its header", path.display()));
            }
            let magic = file.read_u32::<BigEndian>()?;
            let version = file.read_u16::<BigEndian>()?;
            if magic != MAGIC {
                return Err(errdata!("log file {} has bad magic {magic:#x}", path.display()));
            }
            if version != VERSION {
                return Err(errdata!("log file {} has unsupported version {version}", path.display()));
            }
        }

        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size.max(1), file),
            path: path.to_path_buf(),
        })
    }

    /// Appends one operation. The frame is buffered; call [`Log::sync`]
    /// to make it durable.
    pub fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let payload = bincode::serialize(&LogEntry {
            key: key.to_vec(),
            value: value.map(|v| v.to_vec()),
        })?;
        self.writer.write_u32::<BigEndian>(payload.len() as u32)?;
        self.writer.write_u64::<BigEndian>(CRC64.checksum(&payload))?;
        self.writer.write_all(&payload)?;
        Ok(())
    }

    /// Flushes buffered frames and syncs the file to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Iterates the logged operations from the start of the file. Uses
    /// an independent file handle, so it may only be interleaved with
    /// appends after a [`Log::sync`].
    pub fn replay(&self) -> Result<ReplayIter> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(ReplayIter { reader })
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

pub struct ReplayIter {
    reader: BufReader<File>,
}

impl ReplayIter {
    fn read_frame(&mut self) -> Result<Option<LogEntry>> {
        let len = match self.reader.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::from(e)),
        };
        let crc = self
            .reader
            .read_u64::<BigEndian>()
            .map_err(|_| errdata!("log frame is missing its checksum"))?;
        let mut payload = vec![0; len as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|_| errdata!("log frame is truncated"))?;
        if CRC64.checksum(&payload) != crc {
            return Err(errdata!("log frame checksum mismatch"));
        }
        Ok(Some(bincode::deserialize(&payload)?))
    }
}

impl Iterator for ReplayIter {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

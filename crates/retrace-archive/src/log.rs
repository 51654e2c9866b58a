use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{ArchiveError, ArchiveResult};
use crate::event::ArchiveEvent;

/// Flush/sync strategy for the capture log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Durability {
    /// `fsync` after every append (safest, highest latency).
    Always,
    /// Flush to the OS after every append, let the page cache sync.
    #[default]
    Buffered,
}

/// Header size per entry: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct LogWriter {
    writer: BufWriter<File>,
    /// Current write offset in the log file.
    offset: u64,
}

/// Crash-recoverable append-only capture log.
///
/// On-disk format, one frame per event:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized ArchiveEvent)]
/// ```
///
/// The log has a single writer per process and is only ever appended to,
/// so damage can only sit at the tail. Recovery reads front-to-back and
/// stops at the first frame that is truncated or fails its CRC — every
/// event before that point is intact by construction.
pub struct CaptureLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    durability: Durability,
}

impl CaptureLog {
    /// Open (or create) a capture log at the given path.
    pub fn open(path: &Path, durability: Durability) -> ArchiveResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                writer: BufWriter::new(file),
                offset,
            }),
            durability,
        })
    }

    /// Append one event. Returns the byte offset of its frame.
    pub fn append(&self, event: &ArchiveEvent) -> ArchiveResult<u64> {
        let payload =
            bincode::serialize(event).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut w = self.writer.lock().expect("log mutex poisoned");
        let entry_offset = w.offset;

        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;
        if self.durability == Durability::Always {
            w.writer.get_ref().sync_all()?;
        }

        w.offset += HEADER_SIZE as u64 + payload.len() as u64;
        debug!(offset = entry_offset, len = payload.len(), "archive append");
        Ok(entry_offset)
    }

    /// Recover all intact events, front-to-back.
    ///
    /// Stops at the first truncated or CRC-failed frame: in an append-only
    /// single-writer log a torn write can only be the tail of a crashed
    /// process, and everything after it is suspect.
    pub fn recover(&self) -> ArchiveResult<Vec<ArchiveEvent>> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut events = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
                warn!(offset, length, file_len, "truncated archive tail; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match file.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated archive frame; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            if crc32fast::hash(&payload) != expected_crc {
                warn!(offset, "CRC mismatch; stopping recovery");
                break;
            }

            match bincode::deserialize::<ArchiveEvent>(&payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable archive frame; stopping recovery");
                    break;
                }
            }

            offset += HEADER_SIZE as u64 + length as u64;
        }

        debug!(recovered = events.len(), "archive recovery complete");
        Ok(events)
    }

    /// Remove all archived events.
    pub fn truncate(&self) -> ArchiveResult<()> {
        let mut w = self.writer.lock().expect("log mutex poisoned");
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.offset = 0;
        debug!("archive truncated");
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("log mutex poisoned").offset
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for CaptureLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLog")
            .field("path", &self.path)
            .field("offset", &self.offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_types::ValueHash;

    fn event(byte: u8) -> ArchiveEvent {
        ArchiveEvent::RefAcquired {
            hash: ValueHash::from_digest([byte; 32]),
        }
    }

    #[test]
    fn append_and_recover_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = CaptureLog::open(&dir.path().join("capture.log"), Durability::Buffered).unwrap();

        log.append(&event(1)).unwrap();
        log.append(&event(2)).unwrap();
        log.append(&event(3)).unwrap();

        let recovered = log.recover().unwrap();
        assert_eq!(recovered, vec![event(1), event(2), event(3)]);
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = CaptureLog::open(&dir.path().join("empty.log"), Durability::Buffered).unwrap();
        assert!(log.recover().unwrap().is_empty());
    }

    #[test]
    fn recovery_stops_at_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.log");
        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();

        log.append(&event(1)).unwrap();
        let second = log.append(&event(2)).unwrap();
        log.append(&event(3)).unwrap();
        drop(log);

        // Flip one payload byte of the second frame.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(second + HEADER_SIZE as u64)).unwrap();
            let mut byte = [0u8; 1];
            file.read_exact(&mut byte).unwrap();
            byte[0] ^= 0xFF;
            file.seek(SeekFrom::Start(second + HEADER_SIZE as u64)).unwrap();
            file.write_all(&byte).unwrap();
            file.sync_all().unwrap();
        }

        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();
        let recovered = log.recover().unwrap();
        // Everything before the damaged frame survives; nothing after it
        // is trusted.
        assert_eq!(recovered, vec![event(1)]);
    }

    #[test]
    fn recovery_survives_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.log");
        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();

        log.append(&event(1)).unwrap();
        log.append(&event(2)).unwrap();
        let total = log.offset();
        drop(log);

        // Chop the last 4 bytes, as a crash mid-write would.
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total - 4).unwrap();
        }

        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();
        assert_eq!(log.recover().unwrap(), vec![event(1)]);
    }

    #[test]
    fn truncate_clears_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = CaptureLog::open(&dir.path().join("trunc.log"), Durability::Buffered).unwrap();

        log.append(&event(1)).unwrap();
        assert!(log.offset() > 0);

        log.truncate().unwrap();
        assert_eq!(log.offset(), 0);
        assert!(log.recover().unwrap().is_empty());
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let log = CaptureLog::open(&dir.path().join("offsets.log"), Durability::Buffered).unwrap();

        let a = log.append(&event(1)).unwrap();
        let b = log.append(&event(2)).unwrap();
        assert_eq!(a, 0);
        assert!(b > a);
    }

    #[test]
    fn always_durability_appends_fine() {
        let dir = tempfile::tempdir().unwrap();
        let log = CaptureLog::open(&dir.path().join("sync.log"), Durability::Always).unwrap();
        log.append(&event(1)).unwrap();
        assert_eq!(log.recover().unwrap().len(), 1);
    }

    #[test]
    fn reopening_appends_after_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.log");

        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();
        log.append(&event(1)).unwrap();
        drop(log);

        let log = CaptureLog::open(&path, Durability::Buffered).unwrap();
        log.append(&event(2)).unwrap();

        assert_eq!(log.recover().unwrap(), vec![event(1), event(2)]);
    }
}

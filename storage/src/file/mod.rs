// storage/src/file/mod.rs

use crate::backend::Backend;
use crate::config::StorageConfig;
use crate::{PageId, Result, StorageError, HEAD_SIZE};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic number to identify index files
const FILE_MAGIC: [u8; 4] = *b"GST1"; // GiST version 1

const FILE_VERSION: u32 = 1;

const HEADER_SIZE: usize = 64;

/// Every slot starts with a crc32 and a kind tag.
const SLOT_HEADER_SIZE: usize = 8;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Free = 0,
    Page = 1,
    Head = 2,
}

impl SlotKind {
    fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(SlotKind::Free),
            1 => Some(SlotKind::Page),
            2 => Some(SlotKind::Head),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FileHeader {
    // Core identification (16 bytes)
    magic: [u8; 4],   // "GST1"
    version: u32,     // File format version
    header_size: u32, // Size of this header (64)
    page_size: u32,   // Payload bytes per slot

    // Slot management (16 bytes)
    slot_count: u64,     // Slots ever handed out, ids 1..=slot_count
    free_list_head: u64, // Head of free slot list (0 = no free slots)

    // Timestamps (16 bytes)
    created_at: u64,
    last_modified: u64,

    // Integrity (4 bytes), followed by 12 reserved bytes
    header_checksum: u32,
}

impl FileHeader {
    fn new(page_size: u32) -> Self {
        let now = unix_now();

        Self {
            magic: FILE_MAGIC,
            version: FILE_VERSION,
            header_size: HEADER_SIZE as u32,
            page_size,

            slot_count: 0,
            free_list_head: 0,

            created_at: now,
            last_modified: now,

            header_checksum: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.magic != FILE_MAGIC {
            return Err(invalid_data("Invalid index file: wrong magic number"));
        }

        if self.version > FILE_VERSION {
            return Err(invalid_data(format!(
                "Unsupported file version: {}",
                self.version
            )));
        }

        if self.header_size as usize != HEADER_SIZE {
            return Err(invalid_data(format!(
                "Invalid header size: expected {}, got {}",
                HEADER_SIZE, self.header_size
            )));
        }

        Ok(())
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.header_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.page_size.to_le_bytes());

        bytes[16..24].copy_from_slice(&self.slot_count.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.free_list_head.to_le_bytes());

        bytes[32..40].copy_from_slice(&self.created_at.to_le_bytes());
        bytes[40..48].copy_from_slice(&self.last_modified.to_le_bytes());

        bytes[48..52].copy_from_slice(&self.header_checksum.to_le_bytes());

        bytes
    }

    fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let header = Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: read_u32(bytes, 4),
            header_size: read_u32(bytes, 8),
            page_size: read_u32(bytes, 12),

            slot_count: read_u64(bytes, 16),
            free_list_head: read_u64(bytes, 24),

            created_at: read_u64(bytes, 32),
            last_modified: read_u64(bytes, 40),

            header_checksum: read_u32(bytes, 48),
        };

        header.validate()?;
        Ok(header)
    }

    fn compute_checksum(&self) -> u32 {
        let mut temp = *self;
        temp.header_checksum = 0;
        let bytes = temp.to_bytes();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&bytes[0..48]); // Hash everything before checksum field
        hasher.update(&bytes[52..]); // Hash everything after checksum field
        hasher.finalize()
    }

    fn update_checksum(&mut self) {
        self.header_checksum = self.compute_checksum();
    }

    fn verify_checksum(&self) -> bool {
        self.compute_checksum() == self.header_checksum
    }
}

struct FileState {
    file: File,
    header: FileHeader,
}

/// File-backed slot allocator implementing [`Backend`].
///
/// Slot `n` (1-based) lives at `HEADER_SIZE + (n - 1) * slot_size`. Pages
/// and heads share the slot pool; a head simply uses the first
/// [`HEAD_SIZE`] bytes of its slot. Freed slots are chained through their
/// first payload bytes and reused before the file grows.
pub struct PageFile {
    state: Mutex<FileState>,
    page_size: usize,
    sync_on_write: bool,
    verify_checksums: bool,
}

impl PageFile {
    pub fn create_new(path: &Path, config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut header = FileHeader::new(config.page_size as u32);
        header.update_checksum();

        let mut state = FileState { file, header };
        Self::write_header(&mut state)?;
        log::debug!(
            "created index file {} with {}-byte pages",
            path.display(),
            config.page_size
        );

        Ok(Self {
            state: Mutex::new(state),
            page_size: config.page_size,
            sync_on_write: config.sync_on_write,
            verify_checksums: config.verify_checksums,
        })
    }

    pub fn open(path: &Path, config: &StorageConfig) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let header = Self::read_header(&mut file)?;
        let page_size = header.page_size as usize;
        if page_size != config.page_size {
            log::debug!(
                "{} was created with {}-byte pages, ignoring configured {}",
                path.display(),
                page_size,
                config.page_size
            );
        }

        Ok(Self {
            state: Mutex::new(FileState { file, header }),
            page_size,
            sync_on_write: config.sync_on_write,
            verify_checksums: config.verify_checksums,
        })
    }

    /// Number of slots ever allocated, free ones included.
    pub fn slot_count(&self) -> u64 {
        self.state.lock().header.slot_count
    }

    pub fn sync(&self) -> Result<()> {
        self.state.lock().file.sync_all()?;
        Ok(())
    }

    fn slot_size(&self) -> usize {
        SLOT_HEADER_SIZE + self.page_size
    }

    fn slot_offset(&self, id: PageId) -> u64 {
        HEADER_SIZE as u64 + (id - 1) * self.slot_size() as u64
    }

    fn alloc(&self, kind: SlotKind) -> Result<PageId> {
        let mut state = self.state.lock();

        let id = if state.header.free_list_head != 0 {
            let id = state.header.free_list_head;
            let (found, payload) = self.read_slot(&mut state, id)?;
            if found != SlotKind::Free {
                return Err(invalid_data(format!(
                    "free list points at live slot {}",
                    id
                )));
            }
            state.header.free_list_head = read_u64(&payload, 0);
            id
        } else {
            state.header.slot_count += 1;
            state.header.slot_count
        };

        self.write_slot(&mut state, id, kind, &[])?;
        Self::touch(&mut state)?;
        self.maybe_sync(&mut state)?;
        log::trace!("allocated {:?} slot {}", kind, id);

        Ok(id)
    }

    fn free(&self, id: PageId, kind: SlotKind) -> Result<()> {
        let mut state = self.state.lock();
        self.expect_kind(&mut state, id, kind)?;

        let next = state.header.free_list_head;
        self.write_slot(&mut state, id, SlotKind::Free, &next.to_le_bytes())?;
        state.header.free_list_head = id;
        Self::touch(&mut state)?;
        self.maybe_sync(&mut state)?;
        log::trace!("freed {:?} slot {}", kind, id);

        Ok(())
    }

    fn read(&self, id: PageId, kind: SlotKind, buf: &mut [u8], len: usize) -> Result<()> {
        if buf.len() < len {
            return Err(StorageError::TooShort {
                needed: len,
                available: buf.len(),
            });
        }

        let mut state = self.state.lock();
        let (found, payload) = self.read_slot(&mut state, id)?;
        if found != kind {
            return Err(StorageError::PageNotFound(id));
        }
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(())
    }

    fn write(&self, id: PageId, kind: SlotKind, data: &[u8], limit: usize) -> Result<()> {
        if data.len() > limit {
            return Err(StorageError::TooShort {
                needed: data.len(),
                available: limit,
            });
        }

        let mut state = self.state.lock();
        self.expect_kind(&mut state, id, kind)?;
        self.write_slot(&mut state, id, kind, data)?;
        self.maybe_sync(&mut state)
    }

    fn check_id(&self, state: &FileState, id: PageId) -> Result<()> {
        if id == 0 {
            return Err(StorageError::InvalidPageId(id));
        }
        if id > state.header.slot_count {
            return Err(StorageError::PageNotFound(id));
        }
        Ok(())
    }

    fn expect_kind(&self, state: &mut FileState, id: PageId, kind: SlotKind) -> Result<()> {
        self.check_id(state, id)?;

        let mut slot_header = [0u8; SLOT_HEADER_SIZE];
        state.file.seek(SeekFrom::Start(self.slot_offset(id)))?;
        state.file.read_exact(&mut slot_header)?;

        if SlotKind::from_u32(read_u32(&slot_header, 4)) != Some(kind) {
            return Err(StorageError::PageNotFound(id));
        }
        Ok(())
    }

    fn read_slot(&self, state: &mut FileState, id: PageId) -> Result<(SlotKind, Vec<u8>)> {
        self.check_id(state, id)?;

        let mut buffer = vec![0u8; self.slot_size()];
        state.file.seek(SeekFrom::Start(self.slot_offset(id)))?;
        state.file.read_exact(&mut buffer)?;

        let stored = read_u32(&buffer, 0);
        if self.verify_checksums && crc32fast::hash(&buffer[4..]) != stored {
            return Err(StorageError::ChecksumMismatch(id));
        }

        let kind = SlotKind::from_u32(read_u32(&buffer, 4))
            .ok_or(StorageError::ChecksumMismatch(id))?;
        buffer.drain(..SLOT_HEADER_SIZE);
        Ok((kind, buffer))
    }

    fn write_slot(
        &self,
        state: &mut FileState,
        id: PageId,
        kind: SlotKind,
        payload: &[u8],
    ) -> Result<()> {
        let mut buffer = vec![0u8; self.slot_size()];
        buffer[4..8].copy_from_slice(&(kind as u32).to_le_bytes());
        buffer[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + payload.len()].copy_from_slice(payload);
        let checksum = crc32fast::hash(&buffer[4..]);
        buffer[0..4].copy_from_slice(&checksum.to_le_bytes());

        state.file.seek(SeekFrom::Start(self.slot_offset(id)))?;
        state.file.write_all(&buffer)?;
        Ok(())
    }

    fn maybe_sync(&self, state: &mut FileState) -> Result<()> {
        if self.sync_on_write {
            state.file.sync_data()?;
        }
        Ok(())
    }

    fn touch(state: &mut FileState) -> Result<()> {
        state.header.last_modified = unix_now();
        Self::write_header(state)
    }

    fn write_header(state: &mut FileState) -> Result<()> {
        state.header.update_checksum();
        let header_bytes = state.header.to_bytes();

        state.file.seek(SeekFrom::Start(0))?;
        state.file.write_all(&header_bytes)?;

        Ok(())
    }

    fn read_header(file: &mut File) -> Result<FileHeader> {
        file.seek(SeekFrom::Start(0))?;

        let mut buffer = [0u8; HEADER_SIZE];
        file.read_exact(&mut buffer)?;

        let header = FileHeader::from_bytes(&buffer)?;

        if !header.verify_checksum() {
            return Err(invalid_data("File header checksum mismatch"));
        }

        Ok(header)
    }
}

impl Backend for PageFile {
    fn page_capacity(&self) -> usize {
        self.page_size
    }

    fn alloc_page(&self) -> Result<PageId> {
        self.alloc(SlotKind::Page)
    }

    fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.read(id, SlotKind::Page, buf, self.page_size)
    }

    fn write_page(&self, id: PageId, data: &[u8]) -> Result<()> {
        self.write(id, SlotKind::Page, data, self.page_size)
    }

    fn free_page(&self, id: PageId) -> Result<()> {
        self.free(id, SlotKind::Page)
    }

    fn alloc_head(&self) -> Result<PageId> {
        self.alloc(SlotKind::Head)
    }

    fn read_head(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.read(id, SlotKind::Head, buf, HEAD_SIZE)
    }

    fn write_head(&self, id: PageId, data: &[u8]) -> Result<()> {
        self.write(id, SlotKind::Head, data, HEAD_SIZE)
    }

    fn free_head(&self, id: PageId) -> Result<()> {
        self.free(id, SlotKind::Head)
    }
}

fn invalid_data(msg: impl Into<String>) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup(page_size: usize) -> (TempDir, PathBuf, StorageConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.gst");
        let config = StorageConfig::default().with_page_size(page_size);
        (dir, path, config)
    }

    #[test]
    fn test_header_round_trip() {
        let mut header = FileHeader::new(4096);
        header.slot_count = 7;
        header.free_list_head = 3;
        header.update_checksum();

        let decoded = FileHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.page_size, 4096);
        assert_eq!(decoded.slot_count, 7);
        assert_eq!(decoded.free_list_head, 3);
        assert!(decoded.verify_checksum());
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = FileHeader::new(64).to_bytes();
        bytes[0..4].copy_from_slice(b"NOPE");
        assert!(FileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_create_write_read() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();

        let id = file.alloc_page().unwrap();
        assert_eq!(id, 1);
        file.write_page(id, b"hello pages").unwrap();

        let mut buf = [0u8; 64];
        file.read_page(id, &mut buf).unwrap();
        assert_eq!(&buf[..11], b"hello pages");
        assert!(buf[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let (_dir, path, config) = setup(64);
        PageFile::create_new(&path, &config).unwrap();
        assert!(PageFile::create_new(&path, &config).is_err());
    }

    #[test]
    fn test_reopen_keeps_pages_and_page_size() {
        let (_dir, path, config) = setup(128);
        let (page, head) = {
            let file = PageFile::create_new(&path, &config).unwrap();
            let page = file.alloc_page().unwrap();
            let head = file.alloc_head().unwrap();
            file.write_page(page, b"page").unwrap();
            file.write_head(head, b"head").unwrap();
            file.sync().unwrap();
            (page, head)
        };

        let reopened = PageFile::open(&path, &config.clone().with_page_size(4096)).unwrap();
        assert_eq!(reopened.page_capacity(), 128);

        let mut buf = [0u8; 128];
        reopened.read_page(page, &mut buf).unwrap();
        assert_eq!(&buf[..4], b"page");

        let mut head_buf = [0u8; HEAD_SIZE];
        reopened.read_head(head, &mut head_buf).unwrap();
        assert_eq!(&head_buf[..4], b"head");
    }

    #[test]
    fn test_free_list_reuses_slots() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();

        let a = file.alloc_page().unwrap();
        let b = file.alloc_page().unwrap();
        let c = file.alloc_page().unwrap();
        file.free_page(a).unwrap();
        file.free_page(c).unwrap();

        // LIFO free list
        assert_eq!(file.alloc_page().unwrap(), c);
        assert_eq!(file.alloc_head().unwrap(), a);
        assert_eq!(file.alloc_page().unwrap(), 4);
        assert_eq!(file.slot_count(), 4);

        let mut buf = [0u8; 64];
        file.read_page(b, &mut buf).unwrap();
    }

    #[test]
    fn test_freed_slot_is_not_readable() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();
        let id = file.alloc_page().unwrap();
        file.free_page(id).unwrap();

        let mut buf = [0u8; 64];
        assert!(matches!(
            file.read_page(id, &mut buf),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(matches!(
            file.free_page(id),
            Err(StorageError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();
        let head = file.alloc_head().unwrap();

        let mut buf = [0u8; 64];
        assert!(matches!(
            file.read_page(head, &mut buf),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(file.write_page(head, b"x").is_err());
    }

    #[test]
    fn test_out_of_range_ids() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();
        let mut buf = [0u8; 64];

        assert!(matches!(
            file.read_page(0, &mut buf),
            Err(StorageError::InvalidPageId(0))
        ));
        assert!(matches!(
            file.read_page(9, &mut buf),
            Err(StorageError::PageNotFound(9))
        ));
    }

    #[test]
    fn test_oversized_writes_rejected() {
        let (_dir, path, config) = setup(64);
        let file = PageFile::create_new(&path, &config).unwrap();
        let page = file.alloc_page().unwrap();
        let head = file.alloc_head().unwrap();

        assert!(matches!(
            file.write_page(page, &[1u8; 65]),
            Err(StorageError::TooShort { .. })
        ));
        assert!(matches!(
            file.write_head(head, &[1u8; HEAD_SIZE + 1]),
            Err(StorageError::TooShort { .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let (_dir, path, config) = setup(64);
        let id = {
            let file = PageFile::create_new(&path, &config).unwrap();
            let id = file.alloc_page().unwrap();
            file.write_page(id, b"intact").unwrap();
            id
        };

        // Flip one payload byte behind the allocator's back
        let mut raw = std::fs::read(&path).unwrap();
        raw[HEADER_SIZE + SLOT_HEADER_SIZE] ^= 0xFF;
        std::fs::write(&path, &raw).unwrap();

        let file = PageFile::open(&path, &config).unwrap();
        let mut buf = [0u8; 64];
        assert!(matches!(
            file.read_page(id, &mut buf),
            Err(StorageError::ChecksumMismatch(_))
        ));

        let lenient = PageFile::open(&path, &config.with_verify_checksums(false)).unwrap();
        lenient.read_page(id, &mut buf).unwrap();
    }

    #[test]
    fn test_corrupt_header_detected() {
        let (_dir, path, config) = setup(64);
        PageFile::create_new(&path, &config).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        raw[16] ^= 0x01; // slot_count
        std::fs::write(&path, &raw).unwrap();

        assert!(PageFile::open(&path, &config).is_err());
    }
}

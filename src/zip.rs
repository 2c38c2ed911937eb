//! The `Zip` container owns the sink, the ordered list of finished entries,
//! and the current in-progress entry. `LocalFile` is a thin handle borrowed
//! from `Zip::add` that exposes the entry-scoped API without the container
//! needing a self-referential struct.

use crate::bytes::{push_u16, push_u32, push_u64};
use crate::compression::{CompressionEngine, Store};
use crate::entry::{sanitize_name, version_made_by, EntryState, EntryWriteState, FinishedEntry};
use crate::error::{Result, ZipError};
use crate::mstime::MsDosTime;
use crate::rng::Pcg32;
use crate::zip_aes::{AesMode, ZipAes};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

const EOCD_SIGNATURE: u32 = 0x06054B50;
const ZIP64_EOCD_SIGNATURE: u32 = 0x06064B50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064B50;

/// Size at which a field would collide with the `0xFFFFFFFF` ZIP64 sentinel
/// and must be represented in a ZIP64 extra record instead of its native
/// 32-bit slot.
const U32_OVERFLOW: u64 = u32::MAX as u64;
const U16_OVERFLOW: usize = u16::MAX as usize - 1;

const SCRATCH_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    Writing,
    Closed,
}

/// A streaming ZIP archive writer.
///
/// Entries are written in order through [`Zip::add`], which returns a
/// [`LocalFile`] handle scoped to the newly opened entry. Only one entry may
/// be in its Writing state at a time; starting a new one, or calling
/// [`Zip::close`], first closes whichever entry is currently open.
pub struct Zip<S: Write + Seek> {
    sink: S,
    owns_sink: bool,
    start_offset: u64,
    state: ContainerState,
    zip64: bool,
    entries: Vec<FinishedEntry>,
    comment: String,
    rng: Pcg32,
    scratch: Vec<u8>,
    current: Option<EntryState>,
    allow_empty_names: bool,
}

impl Zip<File> {
    /// Creates (truncating) the file at `path` and opens a new archive over
    /// it. The returned `Zip` owns the file handle.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file, true)
    }
}

impl<S: Write + Seek> Zip<S> {
    /// Wraps an existing sink. `owns_sink` only affects best-effort
    /// flush-on-drop behavior; the sink is never closed or truncated here.
    pub fn new(mut sink: S, owns_sink: bool) -> Result<Self> {
        let start_offset = sink.stream_position()?;
        Ok(Zip {
            sink,
            owns_sink,
            start_offset,
            state: ContainerState::Writing,
            zip64: false,
            entries: Vec::new(),
            comment: String::new(),
            rng: Pcg32::from_entropy(),
            scratch: Vec::with_capacity(SCRATCH_CAPACITY),
            current: None,
            allow_empty_names: false,
        })
    }

    /// Sets the archive-level comment (must fit in 16 bits once encoded).
    pub fn comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// When set, `add("")` (or an all-slash name) is accepted instead of
    /// raising `InvalidFileName`.
    pub fn allow_empty_names(&mut self, allow: bool) {
        self.allow_empty_names = allow;
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.sink.stream_position()? - self.start_offset)
    }

    /// Closes the current entry (if any) and opens a new one in Preparing
    /// state, returning a handle scoped to it.
    pub fn add(&mut self, name: &str) -> Result<LocalFile<'_, S>> {
        self.close_current_entry()?;
        let sanitized = sanitize_name(name);
        if sanitized.is_empty() && !self.allow_empty_names {
            return Err(ZipError::InvalidFileName(name.to_string()));
        }
        let offset = self.position()?;
        self.current = Some(EntryState::new(sanitized, offset));
        Ok(LocalFile { zip: self })
    }

    /// Closes the current entry and emits the central directory, optional
    /// ZIP64 end-of-central-directory record/locator, and the EOCD record.
    /// Idempotent: calling `close` again on an already-closed archive is a
    /// no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ContainerState::Closed {
            return Ok(());
        }
        self.close_current_entry()?;

        let cd_offset = self.position()?;
        for entry in &self.entries {
            self.sink
                .write_all(&entry.build_central_directory_record())?;
        }
        let cd_end = self.position()?;
        let cd_size = cd_end - cd_offset;

        let need_zip64 = self.entries.len() >= U16_OVERFLOW
            || cd_size >= U32_OVERFLOW
            || cd_offset >= U32_OVERFLOW
            || self.entries.iter().any(FinishedEntry::needs_zip64);
        self.zip64 = need_zip64;

        if need_zip64 {
            let record_offset = self.position()?;
            let mut record = Vec::new();
            push_u32(&mut record, ZIP64_EOCD_SIGNATURE);
            push_u64(&mut record, 44); // size of remaining record fields
            push_u16(&mut record, version_made_by());
            push_u16(&mut record, 45); // version needed: zip64
            push_u32(&mut record, 0); // disk number
            push_u32(&mut record, 0); // disk with central directory
            push_u64(&mut record, self.entries.len() as u64);
            push_u64(&mut record, self.entries.len() as u64);
            push_u64(&mut record, cd_size);
            push_u64(&mut record, cd_offset);
            self.sink.write_all(&record)?;

            let mut locator = Vec::new();
            push_u32(&mut locator, ZIP64_LOCATOR_SIGNATURE);
            push_u32(&mut locator, 0); // disk with the zip64 EOCD record
            push_u64(&mut locator, record_offset);
            push_u32(&mut locator, 1); // total number of disks
            self.sink.write_all(&locator)?;
        }

        let mut eocd = Vec::new();
        push_u32(&mut eocd, EOCD_SIGNATURE);
        push_u16(&mut eocd, 0); // disk number
        push_u16(&mut eocd, 0); // disk with central directory
        let clamped_count = self.entries.len().min(0xFFFF) as u16;
        push_u16(&mut eocd, clamped_count);
        push_u16(&mut eocd, clamped_count);
        push_u32(&mut eocd, if cd_size >= U32_OVERFLOW { u32::MAX } else { cd_size as u32 });
        push_u32(
            &mut eocd,
            if cd_offset >= U32_OVERFLOW { u32::MAX } else { cd_offset as u32 },
        );
        push_u16(&mut eocd, self.comment.len() as u16);
        eocd.extend_from_slice(self.comment.as_bytes());
        self.sink.write_all(&eocd)?;

        self.sink.flush()?;
        self.state = ContainerState::Closed;
        Ok(())
    }

    fn close_current_entry(&mut self) -> Result<()> {
        let mut entry = match self.current.take() {
            Some(e) => e,
            None => return Ok(()),
        };
        if entry.state == EntryWriteState::Closed {
            self.current = Some(entry);
            return Ok(());
        }

        if entry.state == EntryWriteState::Preparing {
            // Never written to: silently disable AES/ZIP64/compression so
            // directory and empty entries stay conformant, then write the
            // (now trivial) header directly.
            entry.aes_mode = None;
            entry.password = None;
            entry.zip64 = false;
            entry.engine = Box::new(Store);
            self.start_entry(&mut entry)?;
        }

        self.finish_compression(&mut entry)?;

        if let Some(zip_aes) = entry.zip_aes.take() {
            let tag = zip_aes.finalize();
            self.sink.write_all(&tag)?;
            entry.compressed_size += tag.len() as u64;
            check_size_ceiling(&entry)?;
        }

        if entry.use_data_descriptor {
            let data = entry.data_descriptor(entry.zip64);
            self.sink.write_all(&data)?;
        } else {
            self.patch_header(&entry)?;
        }

        let cd_needs_zip64 = entry.zip64
            || entry.uncompressed_size >= U32_OVERFLOW
            || entry.compressed_size >= U32_OVERFLOW
            || entry.local_header_offset >= U32_OVERFLOW;

        self.entries.push(FinishedEntry {
            name: entry.name.clone(),
            comment: entry.comment.clone(),
            modified: entry.modified,
            gp_flag: entry.gp_flag(),
            method: entry.wire_method(),
            version_needed: entry.version_needed(cd_needs_zip64),
            crc: entry.wire_crc(),
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            local_header_offset: entry.local_header_offset,
            external_attribute: entry.external_attribute,
            aes_extra: entry
                .aes_mode
                .map(|mode| (mode, entry.engine.method())),
        });
        entry.state = EntryWriteState::Closed;
        self.current = Some(entry);
        Ok(())
    }

    fn start_entry(&mut self, entry: &mut EntryState) -> Result<()> {
        if entry.state != EntryWriteState::Preparing {
            return Ok(());
        }
        if let Some(password) = entry.password.take() {
            let mode = entry.aes_mode.expect("password implies aes_mode");
            entry.zip_aes = Some(ZipAes::new(&password, mode, &mut self.rng));
        }

        let header = entry.build_local_header(entry.zip64);
        self.sink.write_all(&header)?;

        if let Some(zip_aes) = &entry.zip_aes {
            self.sink.write_all(zip_aes.salt())?;
            let verify = zip_aes.verification_code();
            self.sink.write_all(&verify)?;
            entry.compressed_size += (zip_aes.salt().len() + verify.len()) as u64;
        }

        entry.state = EntryWriteState::Writing;
        Ok(())
    }

    /// Writes `data` through the compression/encryption pipeline, chunked
    /// through the shared scratch buffer.
    fn write_to_current(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(SCRATCH_CAPACITY) {
            let mut entry = self.current.take().ok_or_else(|| {
                ZipError::InvalidState("write called with no entry open".to_string())
            })?;
            let result = self.write_chunk(&mut entry, chunk);
            self.current = Some(entry);
            result?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, entry: &mut EntryState, chunk: &[u8]) -> Result<()> {
        if entry.state == EntryWriteState::Closed {
            return Err(ZipError::InvalidState("entry already closed".to_string()));
        }
        self.start_entry(entry)?;

        if entry.aes_mode.is_none() {
            entry.crc.update(chunk);
        }
        entry.uncompressed_size += chunk.len() as u64;

        self.scratch.clear();
        let mut scratch = std::mem::take(&mut self.scratch);
        entry.engine.compress(chunk, &mut scratch);
        if let Some(zip_aes) = entry.zip_aes.as_mut() {
            zip_aes.apply(&mut scratch);
        }
        entry.compressed_size += scratch.len() as u64;
        self.sink.write_all(&scratch)?;
        scratch.clear();
        self.scratch = scratch;

        check_size_ceiling(entry)
    }

    fn finish_compression(&mut self, entry: &mut EntryState) -> Result<()> {
        self.scratch.clear();
        let mut scratch = std::mem::take(&mut self.scratch);
        entry.engine.finish(&mut scratch);
        if let Some(zip_aes) = entry.zip_aes.as_mut() {
            zip_aes.apply(&mut scratch);
        }
        entry.compressed_size += scratch.len() as u64;
        self.sink.write_all(&scratch)?;
        scratch.clear();
        self.scratch = scratch;
        check_size_ceiling(entry)
    }

    /// Seeks back to the local header to patch in the final CRC/sizes (and
    /// the reserved ZIP64 extra field, if present), then restores the tail
    /// position.
    fn patch_header(&mut self, entry: &EntryState) -> Result<()> {
        let tail = self.sink.stream_position()?;
        let header_start = self.start_offset + entry.local_header_offset;

        self.sink.seek(SeekFrom::Start(header_start + 14))?;
        let mut sizes = Vec::new();
        push_u32(&mut sizes, entry.wire_crc());
        if entry.zip64 {
            push_u32(&mut sizes, u32::MAX);
            push_u32(&mut sizes, u32::MAX);
        } else {
            push_u32(&mut sizes, entry.compressed_size as u32);
            push_u32(&mut sizes, entry.uncompressed_size as u32);
        }
        self.sink.write_all(&sizes)?;

        if entry.zip64 {
            // Extra field starts right after name_len/extra_len (4 bytes)
            // and the name itself; its own 4-byte tag+len header precedes
            // the 16 bytes of size data patched here.
            let extra_offset = header_start + 30 + entry.name.len() as u64 + 4;
            self.sink.seek(SeekFrom::Start(extra_offset))?;
            let mut zip64_sizes = Vec::new();
            push_u64(&mut zip64_sizes, entry.uncompressed_size);
            push_u64(&mut zip64_sizes, entry.compressed_size);
            self.sink.write_all(&zip64_sizes)?;
        }

        self.sink.seek(SeekFrom::Start(tail))?;
        Ok(())
    }

    fn patch_gp_flag(&mut self, local_header_offset: u64, gp_flag: u16) -> Result<()> {
        let tail = self.sink.stream_position()?;
        let header_start = self.start_offset + local_header_offset;
        self.sink.seek(SeekFrom::Start(header_start + 6))?;
        let mut flag = Vec::new();
        push_u16(&mut flag, gp_flag);
        self.sink.write_all(&flag)?;
        self.sink.seek(SeekFrom::Start(tail))?;
        Ok(())
    }

    fn patch_modified(&mut self, local_header_offset: u64, modified: MsDosTime) -> Result<()> {
        let tail = self.sink.stream_position()?;
        let header_start = self.start_offset + local_header_offset;
        self.sink.seek(SeekFrom::Start(header_start + 10))?;
        let mut t = Vec::new();
        push_u16(&mut t, modified.time);
        push_u16(&mut t, modified.date);
        self.sink.write_all(&t)?;
        self.sink.seek(SeekFrom::Start(tail))?;
        Ok(())
    }
}

impl<S: Write + Seek> Drop for Zip<S> {
    fn drop(&mut self) {
        if self.owns_sink {
            let _ = self.sink.flush();
        }
    }
}

fn check_size_ceiling(entry: &EntryState) -> Result<()> {
    if !entry.zip64
        && (entry.compressed_size >= U32_OVERFLOW || entry.uncompressed_size >= U32_OVERFLOW)
    {
        return Err(ZipError::SizeOverflow);
    }
    Ok(())
}

fn ensure_preparing(entry: &EntryState) -> Result<()> {
    if entry.state != EntryWriteState::Preparing {
        return Err(ZipError::InvalidState(
            "this property can only be set before the entry starts writing".to_string(),
        ));
    }
    Ok(())
}

fn ensure_not_closed(entry: &EntryState) -> Result<()> {
    if entry.state == EntryWriteState::Closed {
        return Err(ZipError::InvalidState("entry is closed".to_string()));
    }
    Ok(())
}

/// A handle to the entry most recently opened by [`Zip::add`]. Borrows the
/// owning `Zip` mutably for its lifetime, so at most one `LocalFile` can
/// exist at a time, enforcing "at most one entry is in Writing state" at
/// the type level rather than at runtime.
pub struct LocalFile<'a, S: Write + Seek> {
    zip: &'a mut Zip<S>,
}

impl<'a, S: Write + Seek> LocalFile<'a, S> {
    fn current(&self) -> &EntryState {
        self.zip.current.as_ref().expect("LocalFile always has a current entry")
    }

    fn current_mut(&mut self) -> &mut EntryState {
        self.zip.current.as_mut().expect("LocalFile always has a current entry")
    }

    /// Enables AES encryption with the given password and bit count
    /// (128/192/256). An unsupported bit count is downgraded to AES-256
    /// with a logged warning.
    pub fn password(&mut self, password: &str, bits: u16) -> Result<&mut Self> {
        ensure_preparing(self.current())?;
        let mode = match bits {
            128 => AesMode::Aes128,
            192 => AesMode::Aes192,
            256 => AesMode::Aes256,
            other => {
                log::warn!("unsupported AES bit count {other}, substituting AES-256");
                AesMode::Aes256
            }
        };
        let entry = self.current_mut();
        entry.aes_mode = Some(mode);
        entry.password = Some(password.to_string());
        Ok(self)
    }

    /// Opts this entry into 64-bit size fields. Must be called before any
    /// data is written.
    pub fn zip64(&mut self, enabled: bool) -> Result<&mut Self> {
        ensure_preparing(self.current())?;
        self.current_mut().zip64 = enabled;
        Ok(self)
    }

    /// Replaces the default compression engine (store). Must be called
    /// before any data is written.
    pub fn compression_engine(&mut self, engine: Box<dyn CompressionEngine>) -> Result<&mut Self> {
        ensure_preparing(self.current())?;
        self.current_mut().engine = engine;
        Ok(self)
    }

    /// Sets the entry's modification time. Patches the already-written
    /// local header in place if the entry is already Writing.
    pub fn modified(&mut self, time: MsDosTime) -> Result<&mut Self> {
        ensure_not_closed(self.current())?;
        self.current_mut().modified = time;
        if self.current().state == EntryWriteState::Writing {
            let offset = self.current().local_header_offset;
            self.zip.patch_modified(offset, time)?;
        }
        Ok(self)
    }

    /// Sets the entry's UTF-8 name/comment flag. Patches the already-written
    /// local header's general-purpose flag in place if the entry is already
    /// Writing.
    pub fn utf8(&mut self, enabled: bool) -> Result<&mut Self> {
        ensure_not_closed(self.current())?;
        self.current_mut().utf8 = enabled;
        if self.current().state == EntryWriteState::Writing {
            let offset = self.current().local_header_offset;
            let gp_flag = self.current().gp_flag();
            self.zip.patch_gp_flag(offset, gp_flag)?;
        }
        Ok(self)
    }

    /// Sets the per-entry comment, written into the central directory
    /// record at close time.
    pub fn comment(&mut self, comment: impl Into<String>) -> Result<&mut Self> {
        ensure_not_closed(self.current())?;
        self.current_mut().comment = comment.into();
        Ok(self)
    }

    /// Sets the 32-bit external file attribute (DOS/Windows-compatible
    /// attribute bits, e.g. 0x10 for a directory).
    pub fn external_attribute(&mut self, attribute: u32) -> Result<&mut Self> {
        ensure_not_closed(self.current())?;
        self.current_mut().external_attribute = attribute;
        Ok(self)
    }

    /// Explicitly transitions Preparing -> Writing, writing the local
    /// header (and, if encrypted, the salt + verification bytes) without
    /// requiring a first data write.
    pub fn start(&mut self) -> Result<&mut Self> {
        let mut entry = self.zip.current.take().expect("LocalFile always has a current entry");
        let result = self.zip.start_entry(&mut entry);
        self.zip.current = Some(entry);
        result?;
        Ok(self)
    }

    /// Writes plaintext bytes, driving them through compression and (if
    /// enabled) AES-CTR encryption before reaching the sink.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.zip.write_to_current(data)
    }

    /// Closes the entry: writes the HMAC tag (if encrypted), patches the
    /// local header with final CRC/sizes, and records the central directory
    /// entry. A no-op if already closed.
    pub fn close(&mut self) -> Result<()> {
        self.zip.close_current_entry()
    }

    pub fn name(&self) -> &str {
        &self.current().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_u16(buf: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([buf[at], buf[at + 1]])
    }

    fn read_u32(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    #[test]
    fn size_ceiling_rejects_overflow_without_zip64() {
        let mut entry = EntryState::new("f".to_string(), 0);
        entry.compressed_size = U32_OVERFLOW;
        assert!(matches!(check_size_ceiling(&entry), Err(ZipError::SizeOverflow)));
        entry.zip64 = true;
        assert!(check_size_ceiling(&entry).is_ok());
    }

    #[test]
    fn empty_name_is_rejected_unless_opted_in() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        assert!(matches!(zip.add("///"), Err(ZipError::InvalidFileName(_))));
        zip.allow_empty_names(true);
        assert!(zip.add("///").is_ok());
    }

    #[test]
    fn close_is_idempotent() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        zip.add("a.txt").unwrap().write(b"hi").unwrap();
        zip.close().unwrap();
        let len_after_first_close = zip.sink.get_ref().len();
        zip.close().unwrap();
        assert_eq!(zip.sink.get_ref().len(), len_after_first_close);
    }

    #[test]
    fn stored_entry_round_trips_through_a_cursor_sink() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        zip.add("hello.txt").unwrap().write(b"Hello, World!").unwrap();
        zip.close().unwrap();

        let bytes = zip.sink.get_ref().clone();
        assert_eq!(read_u32(&bytes, 0), 0x04034B50);
        assert_eq!(read_u16(&bytes, 8), 0); // method: store
        assert_eq!(read_u32(&bytes, 14), 0xEC4AC3D0); // crc32("Hello, World!")
        let name_len = read_u16(&bytes, 26) as usize;
        let extra_len = read_u16(&bytes, 28) as usize;
        let data_start = 30 + name_len + extra_len;
        assert_eq!(&bytes[30..30 + name_len], b"hello.txt");
        assert_eq!(&bytes[data_start..data_start + 13], b"Hello, World!");
    }

    #[test]
    fn directory_entry_closed_without_writing_downgrades_cleanly() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        {
            let mut entry = zip.add("folder/").unwrap();
            entry.external_attribute(0x10).unwrap();
            entry.password("ignored", 256).unwrap();
            entry.zip64(true).unwrap();
        }
        zip.close().unwrap();

        let bytes = zip.sink.get_ref().clone();
        assert_eq!(read_u16(&bytes, 4), 20); // version needed for a directory
        assert_eq!(read_u16(&bytes, 6), 0); // no encryption applied
        assert_eq!(read_u16(&bytes, 8), 0); // store
        let extra_len = read_u16(&bytes, 28) as usize;
        assert_eq!(extra_len, 0);
    }

    #[test]
    fn modified_during_writing_patches_the_local_header_in_place() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        let t = MsDosTime::new(2024, 3, 15, 13, 30, 45);
        {
            let mut entry = zip.add("a.txt").unwrap();
            entry.write(b"first chunk").unwrap();
            entry.modified(t).unwrap();
        }
        zip.close().unwrap();

        let bytes = zip.sink.get_ref().clone();
        assert_eq!(read_u16(&bytes, 10), t.time);
        assert_eq!(read_u16(&bytes, 12), t.date);
    }

    #[test]
    fn many_entries_promote_the_archive_to_zip64_eocd() {
        let mut zip = Zip::new(Cursor::new(Vec::new()), false).unwrap();
        for i in 0..u16::MAX as u32 + 1 {
            zip.add(&format!("e{i}")).unwrap().close().unwrap();
        }
        zip.close().unwrap();

        let bytes = zip.sink.get_ref().clone();
        let eocd_sig = EOCD_SIGNATURE.to_le_bytes();
        let eocd_at = bytes
            .windows(4)
            .rposition(|w| *w == eocd_sig)
            .expect("eocd present");
        assert_eq!(read_u16(&bytes, eocd_at + 8), 0xFFFF);

        let locator_sig = ZIP64_LOCATOR_SIGNATURE.to_le_bytes();
        let locator_at = bytes
            .windows(4)
            .rposition(|w| *w == locator_sig)
            .expect("zip64 locator present");
        assert!(locator_at < eocd_at);
    }
}


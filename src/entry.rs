//! [`EntryState`]: the in-progress bookkeeping for one ZIP entry. This
//! module holds the data and pure header-layout logic; the actual I/O
//! (seeking to patch a header, writing bytes to the sink) lives in
//! [`crate::zip`], which drives an `EntryState` through its
//! Preparing -> Writing -> Closed lifecycle.

use crate::bytes::{push_u16, push_u32, push_u64};
use crate::compression::{CompressionEngine, Store};
use crate::mstime::MsDosTime;
use crate::zip_aes::{AesMode, ZipAes, AUTH_CODE_LENGTH};

pub const LOCAL_HEADER_SIGNATURE: u32 = 0x04034B50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074B50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014B50;
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;
pub const AES_EXTRA_TAG: u16 = 0x9901;

/// gp_flag bit 0: entry is encrypted.
pub const GP_FLAG_ENCRYPTED: u16 = 1 << 0;
/// gp_flag bit 3: sizes/CRC live in a trailing data descriptor.
pub const GP_FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// gp_flag bit 11: name/comment are UTF-8.
pub const GP_FLAG_UTF8: u16 = 1 << 11;

/// AE-x on-wire compression method: the real method is recorded in the
/// 0x9901 extra field instead.
pub const METHOD_AE_X: u16 = 0x0063;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWriteState {
    Preparing,
    Writing,
    Closed,
}

/// In-progress state for one entry, owned by `Zip::current`.
pub struct EntryState {
    pub state: EntryWriteState,
    pub name: String,
    pub comment: String,
    pub modified: MsDosTime,
    pub utf8: bool,
    pub external_attribute: u32,
    pub zip64: bool,
    pub aes_mode: Option<AesMode>,
    pub password: Option<String>,
    pub engine: Box<dyn CompressionEngine>,
    pub local_header_offset: u64,
    pub crc: crate::crc32::Crc32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub zip_aes: Option<ZipAes>,
    /// The data-descriptor writer remains implemented (see
    /// `write_data_descriptor`) but is never flipped on, since every sink
    /// this crate targets is seekable and patch-at-close is more compact.
    pub use_data_descriptor: bool,
}

impl EntryState {
    pub fn new(name: String, local_header_offset: u64) -> Self {
        EntryState {
            state: EntryWriteState::Preparing,
            name,
            comment: String::new(),
            modified: MsDosTime::default(),
            utf8: false,
            external_attribute: 0,
            zip64: false,
            aes_mode: None,
            password: None,
            engine: Box::new(Store),
            local_header_offset,
            crc: crate::crc32::Crc32::new(),
            compressed_size: 0,
            uncompressed_size: 0,
            zip_aes: None,
            use_data_descriptor: false,
        }
    }

    fn is_directory_attr(&self) -> bool {
        self.external_attribute & 0x10 != 0
    }

    fn is_volume_label_attr(&self) -> bool {
        self.external_attribute & 0x08 != 0
    }

    /// Computes `version-needed-to-extract` from the entry's compression,
    /// encryption, and attribute bits.
    pub fn version_needed(&self, requires_zip64: bool) -> u16 {
        let compression_version = self.engine.version();
        let encryption_version = if self.aes_mode.is_some() { 51 } else { 0 };
        let mut functionality_version = 0u16;
        if self.is_volume_label_attr() {
            functionality_version = functionality_version.max(11);
        }
        if self.is_directory_attr() {
            functionality_version = functionality_version.max(20);
        }
        if requires_zip64 {
            functionality_version = functionality_version.max(45);
        }
        compression_version
            .max(encryption_version)
            .max(functionality_version)
    }

    /// On-wire compression method: 0x0063 (AE-x) when AES is enabled,
    /// otherwise the engine's own method code.
    pub fn wire_method(&self) -> u16 {
        if self.aes_mode.is_some() {
            METHOD_AE_X
        } else {
            self.engine.method()
        }
    }

    pub fn gp_flag(&self) -> u16 {
        let mut flag = 0u16;
        if self.aes_mode.is_some() {
            flag |= GP_FLAG_ENCRYPTED;
        }
        if self.use_data_descriptor {
            flag |= GP_FLAG_DATA_DESCRIPTOR;
        }
        if self.utf8 {
            flag |= GP_FLAG_UTF8;
        }
        flag
    }

    /// Builds the fixed 30-byte local header plus name and extra fields.
    /// `requires_zip64` reserves the 20-byte ZIP64 extra (16 bytes of data)
    /// with zeroed placeholders that `Zip` patches once sizes are known.
    pub fn build_local_header(&self, requires_zip64: bool) -> Vec<u8> {
        let mut extra = Vec::new();
        if requires_zip64 {
            push_u16(&mut extra, ZIP64_EXTRA_TAG);
            push_u16(&mut extra, 16);
            push_u64(&mut extra, 0); // uncompressed placeholder
            push_u64(&mut extra, 0); // compressed placeholder
        }
        if let Some(mode) = self.aes_mode {
            push_u16(&mut extra, AES_EXTRA_TAG);
            push_u16(&mut extra, 7);
            push_u16(&mut extra, 0x0002); // AE-2
            extra.extend_from_slice(b"AE");
            extra.push(mode.wire_code());
            push_u16(&mut extra, self.engine.method());
        }

        let mut header = Vec::with_capacity(30 + self.name.len() + extra.len());
        push_u32(&mut header, LOCAL_HEADER_SIGNATURE);
        push_u16(&mut header, self.version_needed(requires_zip64));
        push_u16(&mut header, self.gp_flag());
        push_u16(&mut header, self.wire_method());
        push_u16(&mut header, self.modified.time);
        push_u16(&mut header, self.modified.date);
        push_u32(&mut header, 0); // crc placeholder
        push_u32(&mut header, 0); // compressed size placeholder
        push_u32(&mut header, 0); // uncompressed size placeholder
        push_u16(&mut header, self.name.len() as u16);
        push_u16(&mut header, extra.len() as u16);
        header.extend_from_slice(self.name.as_bytes());
        header.extend_from_slice(&extra);
        header
    }

    /// The effective, post-close CRC value: AE-2 mandates CRC=0 in every
    /// header since authentication is via the HMAC tag instead.
    pub fn wire_crc(&self) -> u32 {
        if self.aes_mode.is_some() {
            0
        } else {
            self.crc.finalize()
        }
    }

    pub fn data_descriptor(&self, requires_zip64: bool) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, DATA_DESCRIPTOR_SIGNATURE);
        push_u32(&mut out, self.wire_crc());
        if requires_zip64 {
            push_u64(&mut out, self.compressed_size);
            push_u64(&mut out, self.uncompressed_size);
        } else {
            push_u32(&mut out, self.compressed_size as u32);
            push_u32(&mut out, self.uncompressed_size as u32);
        }
        out
    }
}

/// Central-directory bookkeeping for a finished entry.
pub struct FinishedEntry {
    pub name: String,
    pub comment: String,
    pub modified: MsDosTime,
    pub gp_flag: u16,
    pub method: u16,
    pub version_needed: u16,
    pub crc: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub external_attribute: u32,
    pub aes_extra: Option<(AesMode, u16)>,
}

impl FinishedEntry {
    /// Variable-length ZIP64 extra containing only the u32 slots that
    /// actually overflowed, in (uncompressed, compressed, offset) order, or
    /// `None` when nothing overflowed (the record is dropped entirely).
    fn zip64_extra(&self) -> Option<Vec<u8>> {
        let mut data = Vec::new();
        if self.uncompressed_size > u32::MAX as u64 - 1 {
            push_u64(&mut data, self.uncompressed_size);
        }
        if self.compressed_size > u32::MAX as u64 - 1 {
            push_u64(&mut data, self.compressed_size);
        }
        if self.local_header_offset > u32::MAX as u64 - 1 {
            push_u64(&mut data, self.local_header_offset);
        }
        if data.is_empty() {
            return None;
        }
        let mut extra = Vec::new();
        push_u16(&mut extra, ZIP64_EXTRA_TAG);
        push_u16(&mut extra, data.len() as u16);
        extra.extend_from_slice(&data);
        Some(extra)
    }

    pub fn needs_zip64(&self) -> bool {
        self.uncompressed_size > u32::MAX as u64 - 1
            || self.compressed_size > u32::MAX as u64 - 1
            || self.local_header_offset > u32::MAX as u64 - 1
    }

    fn extra_field(&self) -> Vec<u8> {
        let mut extra = self.zip64_extra().unwrap_or_default();
        if let Some((mode, real_method)) = self.aes_extra {
            push_u16(&mut extra, AES_EXTRA_TAG);
            push_u16(&mut extra, 7);
            push_u16(&mut extra, 0x0002);
            extra.extend_from_slice(b"AE");
            extra.push(mode.wire_code());
            push_u16(&mut extra, real_method);
        }
        extra
    }

    /// The 46-byte fixed central directory header plus name/extra/comment.
    pub fn build_central_directory_record(&self) -> Vec<u8> {
        let extra = self.extra_field();
        let clamp_u32 = |v: u64| if v > u32::MAX as u64 - 1 { u32::MAX } else { v as u32 };

        let mut out = Vec::with_capacity(46 + self.name.len() + extra.len() + self.comment.len());
        push_u32(&mut out, CENTRAL_DIRECTORY_SIGNATURE);
        push_u16(&mut out, version_made_by());
        push_u16(&mut out, self.version_needed);
        push_u16(&mut out, self.gp_flag);
        push_u16(&mut out, self.method);
        push_u16(&mut out, self.modified.time);
        push_u16(&mut out, self.modified.date);
        push_u32(&mut out, self.crc);
        push_u32(&mut out, clamp_u32(self.compressed_size));
        push_u32(&mut out, clamp_u32(self.uncompressed_size));
        push_u16(&mut out, self.name.len() as u16);
        push_u16(&mut out, extra.len() as u16);
        push_u16(&mut out, self.comment.len() as u16);
        push_u16(&mut out, 0); // disk number start
        push_u16(&mut out, 0); // internal attributes
        push_u32(&mut out, self.external_attribute);
        push_u32(&mut out, clamp_u32(self.local_header_offset));
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&extra);
        out.extend_from_slice(self.comment.as_bytes());
        out
    }
}

/// `version made by`: upper byte 0 (MS-DOS compatible), lower byte the
/// spec's functionality baseline.
pub fn version_made_by() -> u16 {
    45
}

/// Replaces backslashes with forward slashes and strips leading slashes.
pub fn sanitize_name(name: &str) -> String {
    let replaced = name.replace('\\', "/");
    replaced.trim_start_matches('/').to_string()
}

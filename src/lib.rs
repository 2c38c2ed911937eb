//! # zipforge: a streaming ZIP writer with AES encryption
//!
//! `zipforge` writes ZIP archives one entry at a time to any `Write + Seek`
//! sink, with support for WinZip AE-2 AES-128/192/256 encryption and ZIP64
//! for archives or entries that cross the 32-bit size limits. The AES, CTR,
//! SHA-1, HMAC, and PBKDF2 primitives backing encryption are implemented
//! directly in this crate rather than pulled from RustCrypto, so the whole
//! cryptographic path is auditable in one place.
//!
//! ## Quick start
//!
//! ```no_run
//! use zipforge::Zip;
//!
//! let mut zip = Zip::create("archive.zip")?;
//! zip.add("hello.txt")?.write(b"hello, world")?;
//!
//! let mut secret = zip.add("secret.txt")?;
//! secret.password("correct horse battery staple", 256)?;
//! secret.write(b"only for those who know the password")?;
//! secret.close()?;
//!
//! zip.close()?;
//! # Ok::<(), zipforge::ZipError>(())
//! ```

mod aes;
mod bytes;
mod compression;
mod crc32;
mod ctr;
mod entry;
mod error;
mod gf2;
mod hmac;
mod mstime;
mod pbkdf2;
mod rng;
mod sha1;
mod zip;
mod zip_aes;

pub use compression::{CompressionEngine, Store};
pub use error::{Result, ZipError};
pub use mstime::MsDosTime;
pub use zip::{LocalFile, Zip};

#[cfg(feature = "deflate")]
pub use compression::deflate::Deflate;

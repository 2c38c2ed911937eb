//! Compression seam: the abstract interface the writer consumes, plus the
//! "store" passthrough it ships with. An implementation
//! may plug in DEFLATE/BZip2/LZMA by honoring this contract; the `deflate`
//! feature demonstrates that with `flate2` without changing the default
//! writer's store-only behavior.

/// A pluggable compression method. `compress` is driven with successive
/// plaintext chunks and must emit whatever ciphertext-input fragments it has
/// ready into `output`; it is not required to consume all of `input` in one
/// call (mirroring a real streaming encoder that may buffer internally).
pub trait CompressionEngine {
    /// On-wire compression method code (0 = store, 8 = deflate, …).
    fn method(&self) -> u16;

    /// Minimum version-needed-to-extract this method requires.
    fn version(&self) -> u16;

    /// Feeds `input` through the engine, appending compressed output to
    /// `output`. Returns the number of input bytes consumed.
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize;

    /// Flushes any buffered state at end-of-entry, appending final output.
    fn finish(&mut self, output: &mut Vec<u8>);
}

/// The default engine: method 0, passthrough. `version()` is 10, the
/// version-needed-to-extract floor for a plain stored entry.
pub struct Store;

impl CompressionEngine for Store {
    fn method(&self) -> u16 {
        0
    }

    fn version(&self) -> u16 {
        10
    }

    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize {
        output.extend_from_slice(input);
        input.len()
    }

    fn finish(&mut self, _output: &mut Vec<u8>) {}
}

#[cfg(feature = "deflate")]
pub mod deflate {
    use super::CompressionEngine;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// DEFLATE via `flate2`, method 8, version-needed-to-extract 20.
    pub struct Deflate {
        encoder: DeflateEncoder<Vec<u8>>,
    }

    impl Deflate {
        pub fn new(level: u32) -> Self {
            Deflate {
                encoder: DeflateEncoder::new(Vec::new(), Compression::new(level)),
            }
        }
    }

    impl Default for Deflate {
        fn default() -> Self {
            Self::new(6)
        }
    }

    impl CompressionEngine for Deflate {
        fn method(&self) -> u16 {
            8
        }

        fn version(&self) -> u16 {
            20
        }

        fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize {
            self.encoder.write_all(input).expect("in-memory writer");
            output.append(self.encoder.get_mut());
            input.len()
        }

        fn finish(&mut self, output: &mut Vec<u8>) {
            self.encoder.try_finish().expect("in-memory writer");
            output.append(self.encoder.get_mut());
        }
    }
}

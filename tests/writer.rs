use std::fs;
use tempfile::tempdir;
use zipforge::Zip;

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[test]
fn create_writes_an_empty_archive_readable_as_zero_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.zip");

    let mut zip = Zip::create(&path).unwrap();
    zip.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 22); // EOCD only, no comment
    assert_eq!(read_u32(&bytes, 0), 0x06054B50);
    assert_eq!(read_u16(&bytes, 10), 0); // total entries
}

#[test]
fn single_stored_entry_has_the_expected_header_and_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("single.zip");

    {
        let mut zip = Zip::create(&path).unwrap();
        zip.add("hello.txt").unwrap().write(b"Hello, World!").unwrap();
        zip.close().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    assert_eq!(read_u32(&bytes, 0), 0x04034B50);
    assert_eq!(read_u16(&bytes, 8), 0); // store
    assert_eq!(read_u32(&bytes, 14), 0xEC4AC3D0); // crc32("Hello, World!")
    assert_eq!(read_u32(&bytes, 18), 13); // compressed size
    assert_eq!(read_u32(&bytes, 22), 13); // uncompressed size

    let name_len = read_u16(&bytes, 26) as usize;
    let extra_len = read_u16(&bytes, 28) as usize;
    assert_eq!(&bytes[30..30 + name_len], b"hello.txt");
    let data_start = 30 + name_len + extra_len;
    assert_eq!(&bytes[data_start..data_start + 13], b"Hello, World!");
}

#[test]
fn aes256_entry_is_laid_out_as_winzip_ae2() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secret.zip");
    let plaintext = b"only for those who know the password";

    {
        let mut zip = Zip::create(&path).unwrap();
        let mut entry = zip.add("secret.bin").unwrap();
        entry.password("correct horse battery staple", 256).unwrap();
        entry.write(plaintext).unwrap();
        entry.close().unwrap();
        zip.close().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    assert_eq!(read_u16(&bytes, 6) & 1, 1); // gp flag bit 0: encrypted
    assert_eq!(read_u16(&bytes, 8), 0x0063); // AE-x method
    assert_eq!(read_u32(&bytes, 14), 0); // crc zeroed under AE-2

    let name_len = read_u16(&bytes, 26) as usize;
    let extra_len = read_u16(&bytes, 28) as usize;
    let extra_start = 30 + name_len;
    let extra = &bytes[extra_start..extra_start + extra_len];

    assert_eq!(read_u16(extra, 0), 0x9901); // AES extra tag
    assert_eq!(read_u16(extra, 2), 7); // extra data size
    assert_eq!(read_u16(extra, 4), 2); // AE-2
    assert_eq!(&extra[6..8], b"AE");
    assert_eq!(extra[8], 3); // AES-256
    assert_eq!(read_u16(extra, 9), 0); // real compression method: store

    let data_start = extra_start + extra_len;
    let salt_len = 16; // AES-256 salt length
    let compressed_size = read_u32(&bytes, 18) as usize;
    assert_eq!(compressed_size, salt_len + 2 + plaintext.len() + 10);
    let ciphertext_start = data_start + salt_len + 2;
    let ciphertext = &bytes[ciphertext_start..ciphertext_start + plaintext.len()];
    assert_ne!(ciphertext, plaintext.as_slice());
}

#[test]
fn directory_entry_needs_version_twenty_and_no_aes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dir.zip");

    {
        let mut zip = Zip::create(&path).unwrap();
        let mut entry = zip.add("folder/").unwrap();
        entry.external_attribute(0x10).unwrap();
        zip.close().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    assert_eq!(read_u16(&bytes, 4), 20); // version needed
    assert_eq!(read_u16(&bytes, 6), 0); // no encryption, no data descriptor
    assert_eq!(read_u16(&bytes, 8), 0); // store

    let name_len = read_u16(&bytes, 26) as usize;
    let extra_len = read_u16(&bytes, 28) as usize;
    assert_eq!(&bytes[30..30 + name_len], b"folder/");
    assert_eq!(extra_len, 0);

    // Central directory record's external attribute field, 38 bytes into
    // the 46-byte fixed header.
    let cd_start = 30 + name_len; // no data, no extra: entry ends right after the name
    assert_eq!(read_u32(&bytes, cd_start), 0x02014B50);
    assert_eq!(read_u32(&bytes, cd_start + 38), 0x10);
}

#[test]
fn zip64_entry_flag_does_not_by_itself_promote_the_container() {
    // A single small entry opted into zip64() reserves the local ZIP64
    // extra field, but the archive-level EOCD stays classic since nothing
    // about the central directory itself overflowed. The actual 2^32-1
    // boundary check is covered by a focused unit test in src/zip.rs,
    // where the overflow can be simulated without writing 4GiB of data.
    let dir = tempdir().unwrap();
    let path = dir.path().join("small_zip64.zip");

    {
        let mut zip = Zip::create(&path).unwrap();
        let mut entry = zip.add("big.bin").unwrap();
        entry.zip64(true).unwrap();
        entry.write(b"small").unwrap();
        entry.close().unwrap();
        zip.close().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    let extra_len = read_u16(&bytes, 28) as usize;
    assert_eq!(extra_len, 20); // zip64 extra: tag(2)+len(2)+2x u64
    assert_eq!(read_u32(&bytes, 18), u32::MAX); // compressed size sentinel
    assert_eq!(read_u32(&bytes, 22), u32::MAX); // uncompressed size sentinel

    assert_eq!(read_u32(&bytes, bytes.len() - 22), 0x06054B50); // classic EOCD, no zip64 EOCD
}

#[test]
fn unzip_reports_a_valid_archive_when_available() {
    use std::process::Command;

    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("compat.zip");

    {
        let mut zip = Zip::create(&path).unwrap();
        zip.add("hello.txt").unwrap().write(b"hello from a test").unwrap();
        let mut big = zip.add("big.bin").unwrap();
        for _ in 0..256 {
            big.write(&[0u8; 1024]).unwrap();
        }
        big.close().unwrap();
        zip.close().unwrap();
    }

    let output = Command::new("unzip").arg("-t").arg(&path).output().unwrap();
    assert!(
        output.status.success(),
        "unzip reported failure: {} {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

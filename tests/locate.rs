mod common;

use common::{
    ZipBuilder, container_of_size, exe_bytes, host_with_footer, sample_container, write_file,
};
use sfxzip::{Error, LocateTier, LocatorOptions, locate};

const TEN_MIB: usize = 10 * 1024 * 1024;

#[tokio::test]
async fn footer_locates_container_in_large_host() {
    let dir = tempfile::tempdir().unwrap();
    let container = container_of_size(500_000);
    let host = host_with_footer(&container, 9_000_000, TEN_MIB);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.offset, 9_000_000);
    assert_eq!(location.size, 500_000);
    assert_eq!(location.tier, LocateTier::Footer);
    // EOCD sits at offset + size - 22
    assert_eq!(&host[9_499_978..9_499_982], b"PK\x05\x06");
}

#[tokio::test]
async fn zeroed_footer_magic_falls_back_to_directory_scan() {
    let dir = tempfile::tempdir().unwrap();
    let container = container_of_size(500_000);
    let mut host = host_with_footer(&container, 9_000_000, TEN_MIB);
    let magic_at = TEN_MIB - 34;
    host[magic_at..magic_at + 14].fill(0);
    let path = write_file(dir.path(), "setup.exe", &host);

    // The record lies about 1 MB before EOF, beyond the default window
    assert!(matches!(
        locate::locate(&path).await,
        Err(Error::NotFound { .. })
    ));

    let options = LocatorOptions {
        directory_window: 2 * 1024 * 1024,
        ..Default::default()
    };
    let location = locate::locate_with(&path, options).await.unwrap();
    assert_eq!(location.offset, 9_000_000);
    assert_eq!(location.size, 500_000);
    assert_eq!(location.tier, LocateTier::DirectoryScan);
}

#[tokio::test]
async fn bare_append_is_found_by_directory_scan() {
    let dir = tempfile::tempdir().unwrap();
    let container = sample_container();
    let mut host = exe_bytes(200_000);
    host.extend_from_slice(&container);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.offset, 200_000);
    assert_eq!(location.size, container.len() as u64);
    assert_eq!(location.tier, LocateTier::DirectoryScan);
}

#[tokio::test]
async fn directory_scan_accepts_commented_container() {
    let dir = tempfile::tempdir().unwrap();
    let container = ZipBuilder::new()
        .file("notes.txt", b"release notes")
        .comment(b"built by the release pipeline")
        .build();
    let mut host = exe_bytes(4096);
    host.extend_from_slice(&container);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.offset, 4096);
    assert_eq!(location.end(), host.len() as u64);
}

#[tokio::test]
async fn broken_directory_offsets_fall_back_to_signature_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut container = ZipBuilder::new().file("a.txt", b"alpha").build();
    // cd_offset pointing far past the start of the file
    let len = container.len();
    container[len - 6..len - 2].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
    let mut host = exe_bytes(8192);
    host.extend_from_slice(&container);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.offset, 8192);
    assert_eq!(location.end(), host.len() as u64);
    assert_eq!(location.tier, LocateTier::SignatureScan);
}

#[tokio::test]
async fn host_without_container_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "plain.exe", &exe_bytes(300_000));

    let err = locate::locate(&path).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.phase(), sfxzip::Phase::Locate);
}

#[tokio::test]
async fn missing_host_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = locate::locate(&dir.path().join("absent.exe"))
        .await
        .unwrap_err();
    assert!(!matches!(err, Error::NotFound { .. }));
}

fn footer(offset: usize, size: usize) -> Vec<u8> {
    sfxzip::zip::MetadataFooter::new(offset as u64, size as u64).to_bytes()
}

#[tokio::test]
async fn footer_with_wrong_size_defers_to_directory_scan() {
    let dir = tempfile::tempdir().unwrap();
    let container = sample_container();
    let mut host = exe_bytes(5000);
    host.extend_from_slice(&container);
    host.extend_from_slice(&footer(5000, container.len() - 1));
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.tier, LocateTier::DirectoryScan);
    assert_eq!(location.offset, 5000);
    assert_eq!(location.size, container.len() as u64);
}

#[tokio::test]
async fn footer_with_wrong_offset_defers_to_directory_scan() {
    let dir = tempfile::tempdir().unwrap();
    let container = sample_container();
    let mut host = exe_bytes(5000);
    host.extend_from_slice(&container);
    host.extend_from_slice(&footer(4000, container.len()));
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.tier, LocateTier::DirectoryScan);
    assert_eq!(location.offset, 5000);
    assert_eq!(location.size, container.len() as u64);
}

#[tokio::test]
async fn footer_takes_priority_over_directory_scan() {
    let dir = tempfile::tempdir().unwrap();
    let first = ZipBuilder::new().file("first.txt", b"first payload").build();
    let second = ZipBuilder::new().file("second.txt", b"second").build();
    let mut host = exe_bytes(3000);
    host.extend_from_slice(&first);
    host.extend_from_slice(&second);
    host.extend_from_slice(&footer(3000, first.len()));
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.tier, LocateTier::Footer);
    assert_eq!(location.offset, 3000);
    assert_eq!(location.size, first.len() as u64);
}

#[tokio::test]
async fn directory_scan_prefers_record_nearest_eof() {
    let dir = tempfile::tempdir().unwrap();
    let first = ZipBuilder::new().file("first.txt", b"first payload").build();
    let second = ZipBuilder::new()
        .file("second.txt", b"second")
        .file("third.txt", b"third")
        .build();
    let mut host = exe_bytes(3000);
    host.extend_from_slice(&first);
    host.extend_from_slice(&second);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.tier, LocateTier::DirectoryScan);
    assert_eq!(location.offset, (3000 + first.len()) as u64);
    assert_eq!(location.size, second.len() as u64);
}

#[tokio::test]
async fn directory_scan_steps_past_implausible_trailing_record() {
    let dir = tempfile::tempdir().unwrap();
    let container = sample_container();
    let mut host = exe_bytes(3000);
    host.extend_from_slice(&container);
    // Empty directory: its derived start is the record itself
    let mut stray = b"PK\x05\x06".to_vec();
    stray.resize(22, 0);
    host.extend_from_slice(&stray);
    let path = write_file(dir.path(), "setup.exe", &host);

    let location = locate::locate(&path).await.unwrap();
    assert_eq!(location.tier, LocateTier::DirectoryScan);
    assert_eq!(location.offset, 3000);
    assert_eq!(location.size, container.len() as u64);
}

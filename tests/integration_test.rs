//! End-to-end tests through the public URL API

use anyfs::{
    get_filesystem, open_files, open_url, resolve, ErrorCode, OpenMode, OpenOptions,
    StorageOptions,
};
use std::io::SeekFrom;

fn no_options() -> StorageOptions {
    StorageOptions::default()
}

#[tokio::test]
async fn test_partitioned_write_then_glob_read() {
    let writers = open_files(
        "memory:///it/parts/out-*.csv",
        OpenMode::Write,
        None,
        3,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    assert_eq!(writers.len(), 3);

    for (index, reference) in writers.iter().enumerate() {
        let mut handle = reference.open().await.unwrap();
        handle
            .write(format!("row-{}", index).as_bytes())
            .await
            .unwrap();
        handle.close().await.unwrap();
    }

    let readers = open_files(
        "memory:///it/parts/*.csv",
        OpenMode::Read,
        None,
        1,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    let paths: Vec<&str> = readers.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/it/parts/out-0.csv",
            "/it/parts/out-1.csv",
            "/it/parts/out-2.csv"
        ]
    );

    let mut bodies = Vec::new();
    for reference in &readers {
        let mut handle = reference.open().await.unwrap();
        bodies.push(handle.read_to_end().await.unwrap());
        handle.close().await.unwrap();
    }
    assert_eq!(bodies, vec![b"row-0".to_vec(), b"row-1".to_vec(), b"row-2".to_vec()]);
}

#[tokio::test]
async fn test_custom_name_function() {
    let name_fn = |i: usize| format!("{:03}", i * 5);
    let writers = open_files(
        "memory:///it/named/f-*.bin",
        OpenMode::Write,
        None,
        2,
        Some(&name_fn),
        &no_options(),
    )
    .await
    .unwrap();
    let paths: Vec<&str> = writers.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/it/named/f-000.bin", "/it/named/f-005.bin"]);
}

#[tokio::test]
async fn test_write_template_without_mask_becomes_parts() {
    let writers = open_files(
        "memory:///it/dirout",
        OpenMode::Write,
        None,
        2,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    let paths: Vec<&str> = writers.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/it/dirout/0.part", "/it/dirout/1.part"]);
}

#[tokio::test]
async fn test_compression_inferred_from_extension() {
    let writer = open_url(
        "memory:///it/gz/body.txt.gz",
        OpenMode::Write,
        Some("infer"),
        &no_options(),
    )
    .await
    .unwrap();
    let mut handle = writer.open().await.unwrap();
    handle.write(b"through the codec").await.unwrap();
    handle.close().await.unwrap();

    // Raw object is gzip on the backend
    let fs = get_filesystem("memory", &no_options()).await.unwrap();
    let raw = fs.cat("/it/gz/body.txt.gz").await.unwrap();
    assert_ne!(raw, b"through the codec");
    assert!(raw.len() > 2 && raw[0] == 0x1f && raw[1] == 0x8b, "gzip magic");

    let reader = open_url(
        "memory:///it/gz/body.txt.gz",
        OpenMode::Read,
        Some("infer"),
        &no_options(),
    )
    .await
    .unwrap();
    let mut handle = reader.open().await.unwrap();
    assert_eq!(handle.read_to_end().await.unwrap(), b"through the codec");
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_compression_is_rejected() {
    let err = open_url(
        "memory:///it/x.bin",
        OpenMode::Write,
        Some("snappy"),
        &no_options(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::CompressionUnknown);
}

#[tokio::test]
async fn test_storage_option_collision_via_url() {
    let explicit = StorageOptions::default().host("other.example.com");
    let err = resolve(
        "ftp://real.example.com/pub/a.csv",
        OpenMode::Read,
        1,
        None,
        &explicit,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigOptionCollision);
}

#[tokio::test]
async fn test_unknown_protocol_surfaces_code() {
    let err = resolve("s3://bucket/key", OpenMode::Read, 1, None, &no_options())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FsUnknownProtocol);
}

#[tokio::test]
async fn test_local_roundtrip_through_urls() {
    let scratch = std::env::temp_dir().join(format!("anyfs-it-{}", uuid::Uuid::new_v4()));
    let dir = scratch.to_string_lossy().to_string();

    let writer = open_url(
        &format!("file://{}/sub/data.txt", dir),
        OpenMode::Write,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    let mut handle = writer.open().await.unwrap();
    handle.write(b"on disk").await.unwrap();
    handle.close().await.unwrap();

    let resolved = resolve(
        &format!("{}/sub/*.txt", dir),
        OpenMode::Read,
        1,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    assert_eq!(resolved.paths.len(), 1);
    assert_eq!(resolved.fs.cat(&resolved.paths[0]).await.unwrap(), b"on disk");

    tokio::fs::remove_dir_all(&scratch).await.unwrap();
}

#[tokio::test]
async fn test_read_with_seek_through_handle() {
    let fs = get_filesystem("memory", &no_options()).await.unwrap();
    fs.pipe("/it/seek/data.bin", b"abcdefghij").await.unwrap();

    let reference = open_url(
        "memory:///it/seek/data.bin",
        OpenMode::Read,
        None,
        &no_options(),
    )
    .await
    .unwrap();
    let mut handle = reference.open().await.unwrap();
    handle.seek(SeekFrom::Start(4)).await.unwrap();
    assert_eq!(handle.read(3).await.unwrap(), b"efg");
    assert_eq!(handle.tell(), 7);
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_transactional_write_via_options() {
    let fs = get_filesystem("memory", &no_options()).await.unwrap();
    let mut handle = fs
        .open_with("/it/tx/out.bin", OpenOptions::write().autocommit(false))
        .await
        .unwrap();
    handle.write(b"pending").await.unwrap();
    handle.close().await.unwrap();
    assert!(!fs.exists("/it/tx/out.bin").await.unwrap());
    handle.commit().await.unwrap();
    assert_eq!(fs.cat("/it/tx/out.bin").await.unwrap(), b"pending");
}

#[tokio::test]
async fn test_filesystem_find_recurses() {
    let fs = get_filesystem("memory", &no_options()).await.unwrap();
    fs.pipe("/it/tree/a.txt", b"1").await.unwrap();
    fs.pipe("/it/tree/sub/b.txt", b"2").await.unwrap();
    fs.pipe("/it/tree/sub/deep/c.txt", b"3").await.unwrap();

    let found = fs.find("/it/tree").await.unwrap();
    let names: Vec<&str> = found.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["/it/tree/a.txt", "/it/tree/sub/b.txt", "/it/tree/sub/deep/c.txt"]
    );
}

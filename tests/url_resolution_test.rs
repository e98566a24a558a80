//! URL parsing and multi-path resolution behavior

use anyfs::{
    build_name_function, get_filesystem, glob_to_regex, resolve_many, split_protocol, ErrorCode,
    OpenMode, StorageOptions,
};

#[test]
fn test_split_protocol_variants() {
    assert_eq!(split_protocol("ftp://h/p"), (Some("ftp"), "h/p"));
    assert_eq!(split_protocol("relative/path.csv"), (None, "relative/path.csv"));
    assert_eq!(
        split_protocol("https://example.com/d.csv"),
        (Some("https"), "example.com/d.csv")
    );
}

#[test]
fn test_default_name_function_sorts_to_partition_order() {
    let f = build_name_function(10);
    let names: Vec<String> = (0..11).map(|i| f(i)).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_glob_regex_is_segment_aware() {
    let re = glob_to_regex("/d/*.csv").unwrap();
    assert!(re.is_match("/d/x.csv"));
    assert!(!re.is_match("/d/sub/x.csv"));
    assert!(!re.is_match("/d/x.csv.bak"));
}

#[tokio::test]
async fn test_resolve_many_mixed_protocols_rejected() {
    let urls = vec![
        "memory:///u/a.csv".to_string(),
        "ftp://host/u/b.csv".to_string(),
    ];
    let err = resolve_many(&urls, OpenMode::Read, 1, None, &StorageOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UrlProtocolMismatch);
}

#[tokio::test]
async fn test_resolve_many_expands_globs_per_entry() {
    let fs = get_filesystem("memory", &StorageOptions::default())
        .await
        .unwrap();
    fs.pipe("/u/many/a.csv", b"a").await.unwrap();
    fs.pipe("/u/many/b.csv", b"b").await.unwrap();
    fs.pipe("/u/other/c.csv", b"c").await.unwrap();

    let urls = vec![
        "memory:///u/many/*.csv".to_string(),
        "memory:///u/other/c.csv".to_string(),
    ];
    let resolved = resolve_many(&urls, OpenMode::Read, 1, None, &StorageOptions::default())
        .await
        .unwrap();
    assert_eq!(
        resolved.paths,
        vec!["/u/many/a.csv", "/u/many/b.csv", "/u/other/c.csv"]
    );
    assert_eq!(resolved.token, "memory://");
}

#[tokio::test]
async fn test_resolve_many_write_single_mask_only() {
    let urls = vec![
        "memory:///u/w/a-*.csv".to_string(),
        "memory:///u/w/b-*.csv".to_string(),
    ];
    let err = resolve_many(&urls, OpenMode::Write, 2, None, &StorageOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PathInvalid);
}

#[tokio::test]
async fn test_resolve_many_write_trims_to_num() {
    let urls = vec!["memory:///u/trim/part-*.json".to_string()];
    let resolved = resolve_many(&urls, OpenMode::Write, 2, None, &StorageOptions::default())
        .await
        .unwrap();
    assert_eq!(resolved.paths, vec!["/u/trim/part-0.json", "/u/trim/part-1.json"]);
}

#[tokio::test]
async fn test_glob_without_matches_is_empty() {
    let resolved = resolve_many(
        &["memory:///u/void/*.parquet".to_string()],
        OpenMode::Read,
        1,
        None,
        &StorageOptions::default(),
    )
    .await
    .unwrap();
    assert!(resolved.paths.is_empty());
}

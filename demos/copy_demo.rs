//! Cross-backend copy with transparent compression.
//!
//! Stages a file on local disk, copies it into the in-memory backend as
//! gzip, then reads it back decompressed.
//!
//! Run with: cargo run --example copy_demo

use anyfs::{get_filesystem, open_url, OpenMode, StorageOptions, STATS};
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().compact().init();

    let scratch = std::env::temp_dir().join(format!("anyfs-copy-demo-{}", uuid::Uuid::new_v4()));
    let src_path = format!("{}/report.txt", scratch.to_string_lossy());
    let options = StorageOptions::default();

    let local = get_filesystem("file", &options).await?;
    local
        .pipe(&src_path, b"quarterly numbers: 1, 2, 3\n")
        .await?;
    println!("📄 Staged {}", src_path);

    // Destination ends in .gz, so 'infer' compresses on the way in
    let dst_url = "memory:///reports/report.txt.gz";
    let reader = open_url(&src_path, OpenMode::Read, None, &options).await?;
    let writer = open_url(dst_url, OpenMode::Write, Some("infer"), &options).await?;

    let mut input = reader.open().await?;
    let mut output = writer.open().await?;
    loop {
        let chunk = input.read(64 * 1024).await?;
        if chunk.is_empty() {
            break;
        }
        output.write(&chunk).await?;
    }
    input.close().await?;
    output.close().await?;
    println!("✅ Copied to {}", dst_url);

    let memory = get_filesystem("memory", &options).await?;
    let stored = memory.cat("/reports/report.txt.gz").await?;
    println!("📦 Stored object is {} bytes of gzip", stored.len());

    let back = open_url(dst_url, OpenMode::Read, Some("infer"), &options).await?;
    let mut handle = back.open().await?;
    let plain = handle.read_to_end().await?;
    handle.close().await?;
    println!("🔓 Reads back as: {:?}", String::from_utf8_lossy(&plain));

    tokio::fs::remove_dir_all(&scratch).await.ok();
    println!("{}", STATS.summary());
    Ok(())
}

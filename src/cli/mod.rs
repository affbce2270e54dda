pub mod doctor;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use picsearch::embedding::clip::{model_files, TEXT_MODEL_FILE, TOKENIZER_FILE, VISION_MODEL_FILE};
use std::path::Path;
use tokio::io::AsyncWriteExt;

const MODEL_BASE_URL: &str = "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main";

/// Download the CLIP text and vision towers plus the tokenizer to the cache directory.
pub async fn model_download(config: &picsearch::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = picsearch::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let [text_path, vision_path, tokenizer_path] = model_files(&cache_dir);
    let downloads = [
        (format!("onnx/{TEXT_MODEL_FILE}"), text_path, "~250MB"),
        (format!("onnx/{VISION_MODEL_FILE}"), vision_path, "~350MB"),
        (TOKENIZER_FILE.to_string(), tokenizer_path, "~2MB"),
    ];

    for (remote, dest, size) in downloads {
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if dest.exists() {
            println!("{file_name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {file_name} ({size})...");
        download_file(&format!("{MODEL_BASE_URL}/{remote}"), &dest).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Download a file from a URL with progress bar. Uses atomic write (tmp + rename).
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        pb.inc(chunk.len() as u64);
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

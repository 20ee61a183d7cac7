//! Downloads a regional extract unless it is already on disk.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;
use url::Url;

const USER_AGENT: &str = "osmclip/0.1 (extract pre-fetch)";

/// Last path segment of the extract URL, used as the local file name.
pub fn extract_filename(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid extract URL {}", url))?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string());
    match name {
        Some(name) => Ok(name),
        None => bail!("Extract URL {} has no file name", url),
    }
}

/// Download the extract to `dest` if no file is there yet. Returns
/// whether a download happened. The transfer goes to a `.part` file
/// that is renamed into place once complete, so an interrupted run
/// never leaves a half-written extract behind.
pub async fn fetch_extract(url: &str, dest: &Path) -> Result<bool> {
    if dest.exists() {
        info!("Extract {} already present, skipping download", dest.display());
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!("Downloading {}", url);
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;
    if !response.status().is_success() {
        bail!("Fetching {} returned {}", url, response.status());
    }

    let progress = match response.content_length() {
        Some(length) => {
            let bar = ProgressBar::new(length);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )?
                    .progress_chars("#>-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")?,
            );
            bar
        }
    };

    let part_path = match dest.file_name() {
        Some(name) => {
            let mut part = name.to_os_string();
            part.push(".part");
            dest.with_file_name(part)
        }
        None => bail!("Extract path {} has no file name", dest.display()),
    };

    let mut file = tokio::fs::File::create(&part_path)
        .await
        .with_context(|| format!("Failed to create {}", part_path.display()))?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Transfer from {} failed", url))?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", part_path.display()))?;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);
    progress.finish_and_clear();

    tokio::fs::rename(&part_path, dest)
        .await
        .with_context(|| format!("Failed to move extract into {}", dest.display()))?;
    info!("Saved extract to {}", dest.display());
    Ok(true)
}

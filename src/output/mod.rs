use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::convert::{ConversionState, Converted};
use crate::extractors::Thumbnails;
use crate::utils;

/// Serializable summary of a finished conversion
#[derive(Debug, Serialize)]
pub struct ConversionReport<'a> {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Thumbnails>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,

    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
}

impl<'a> ConversionReport<'a> {
    pub fn from_state(state: &'a ConversionState) -> Self {
        let mut report = Self {
            status: "idle",
            video_id: None,
            title: None,
            link: None,
            thumbnails: None,
            error: None,
            completed_at: Utc::now(),
        };

        match state {
            ConversionState::Idle => {}
            ConversionState::Loading { video_id, .. } => {
                report.status = "loading";
                report.video_id = Some(video_id.as_str());
            }
            ConversionState::Succeeded(converted) => {
                report.status = "success";
                report.video_id = Some(converted.video_id.as_str());
                report.title = converted.title.as_deref();
                report.link = Some(&converted.link);
                report.thumbnails = Some(converted.video_id.thumbnails());
            }
            ConversionState::Failed(err) => {
                report.status = "error";
                report.error = Some(ErrorReport {
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }

        report
    }
}

/// Render a conversion state in the requested format
pub fn render(state: &ConversionState, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&ConversionReport::from_state(state))
            .context("Failed to serialize conversion result"),
        OutputFormat::Text => Ok(format_as_text(state)),
    }
}

fn format_as_text(state: &ConversionState) -> String {
    match state {
        ConversionState::Succeeded(converted) => {
            let thumbs = converted.video_id.thumbnails();
            let mut lines = Vec::with_capacity(3);
            if let Some(title) = &converted.title {
                lines.push(format!("{} {}", style("✓").green(), style(title).bold()));
            } else {
                lines.push(format!("{} Conversion complete", style("✓").green()));
            }
            lines.push(format!("  Download:  {}", converted.link));
            lines.push(format!("  Thumbnail: {}", thumbs.primary));
            lines.join("\n")
        }
        ConversionState::Failed(err) => format!("{} {}", style("✗").red(), err),
        ConversionState::Loading { progress, .. } => {
            if progress.is_empty() {
                "Converting...".to_string()
            } else {
                progress.clone()
            }
        }
        ConversionState::Idle => String::new(),
    }
}

/// Print a conversion state to the console; failures go to stderr
pub fn print_to_console(state: &ConversionState, format: &OutputFormat) -> Result<()> {
    let content = render(state, format)?;

    match (state, format) {
        (ConversionState::Failed(_), OutputFormat::Text) => eprintln!("{}", content),
        _ => println!("{}", content),
    }
    Ok(())
}

/// Download the converted MP3 to `path`.
///
/// Bytes are streamed into a temporary file next to the target which is moved
/// into place once complete, so an interrupted download never leaves a partial file.
pub async fn download_mp3(converted: &Converted, path: &Path, quiet: bool) -> Result<u64> {
    tracing::info!("Downloading MP3 to: {}", path.display());

    let response = reqwest::get(&converted.link)
        .await
        .context("Failed to request MP3")?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download MP3: HTTP {}", response.status());
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(response.content_length().unwrap_or(0))
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_message("Downloading MP3...");

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    fs_err::create_dir_all(&dir)?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)
        .context("Failed to create temporary download file")?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Download interrupted")?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }

    file.flush()?;
    file.persist(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    progress.finish_with_message(format!(
        "Saved {} ({})",
        path.display(),
        utils::format_file_size(downloaded)
    ));

    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::VideoId;
    use crate::ConversionError;

    fn converted(title: Option<&str>) -> Converted {
        Converted {
            video_id: VideoId::parse("dQw4w9WgXcQ").unwrap(),
            link: "https://cdn.example/song.mp3".to_string(),
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn test_json_success_report() {
        let state = ConversionState::Succeeded(converted(Some("Song")));
        let json: serde_json::Value =
            serde_json::from_str(&render(&state, &OutputFormat::Json).unwrap()).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["video_id"], "dQw4w9WgXcQ");
        assert_eq!(json["title"], "Song");
        assert_eq!(json["link"], "https://cdn.example/song.mp3");
        assert_eq!(
            json["thumbnails"]["fallback"],
            "https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg"
        );
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_json_error_report_has_only_user_message() {
        let state = ConversionState::Failed(ConversionError::Transport {
            detail: "dns error".to_string(),
        });
        let rendered = render(&state, &OutputFormat::Json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "transport");
        assert_eq!(
            json["error"]["message"],
            "An error occurred. Please try again later."
        );
        assert!(!rendered.contains("dns error"));
    }

    #[test]
    fn test_text_output() {
        console::set_colors_enabled(false);

        let text = render(&ConversionState::Succeeded(converted(None)), &OutputFormat::Text).unwrap();
        assert!(text.starts_with("✓ Conversion complete"));
        assert!(text.contains("Download:  https://cdn.example/song.mp3"));

        let text = render(
            &ConversionState::Failed(ConversionError::Timeout),
            &OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(text, "✗ Conversion is taking too long. Please try again.");
    }
}

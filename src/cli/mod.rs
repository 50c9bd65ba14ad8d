use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytmp3",
    about = "ytmp3 - Convert YouTube videos to MP3 through a hosted conversion API",
    version,
    long_about = "Extracts the video id from a YouTube link, asks the conversion service for the audio, and waits until a download link is ready."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Conversion service credential
    #[arg(long, global = true, env = "RAPIDAPI_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a YouTube video to MP3 and print the download link
    Convert {
        /// YouTube URL (watch page, short link or embed)
        #[arg(value_name = "URL")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Download the MP3 to this file
        #[arg(short, long, value_name = "FILE", conflicts_with = "save")]
        output: Option<PathBuf>,

        /// Download the MP3 into the configured download directory
        #[arg(long)]
        save: bool,
    },

    /// Print the video id found in a URL
    Id {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Print the thumbnail URLs for a video
    Thumbnail {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable
    Pretty,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "ytmp3",
            "convert",
            "https://youtu.be/dQw4w9WgXcQ",
            "--format",
            "json",
            "--api-key",
            "k",
        ])
        .unwrap();

        assert_eq!(cli.api_key.as_deref(), Some("k"));
        match cli.command {
            Commands::Convert { url, format, output, save } => {
                assert_eq!(url, "https://youtu.be/dQw4w9WgXcQ");
                assert_eq!(format, OutputFormat::Json);
                assert!(output.is_none());
                assert!(!save);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_output_and_save_conflict() {
        let result = Cli::try_parse_from([
            "ytmp3",
            "convert",
            "https://youtu.be/dQw4w9WgXcQ",
            "--output",
            "a.mp3",
            "--save",
        ]);
        assert!(result.is_err());
    }
}

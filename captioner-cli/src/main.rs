use std::path::PathBuf;
use std::time::Duration;

use captioner::{Language, PipelineOptions};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::writer::{MakeWriter, MakeWriterExt};

#[derive(Parser)]
#[command(
    name = "captioner",
    about = "Caption media through a remote transcription service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding downloaded transcripts.
    #[arg(long, global = true, default_value = "results")]
    results_dir: PathBuf,

    /// Directory for generated WebVTT files.
    #[arg(long, global = true, default_value = "webvtt")]
    webvtt_dir: PathBuf,

    /// AWS region (default: AWS_DEFAULT_REGION, then us-east-1).
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Custom vocabulary for new jobs; pass an empty string for none.
    #[arg(long, global = true, default_value = captioner::config::DEFAULT_VOCABULARY)]
    vocabulary: String,

    /// Pause between manifest lines, in milliseconds.
    #[arg(long, global = true, default_value = "500")]
    item_delay_ms: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Upload media and queue a transcription job for each manifest item.
    Transcribe {
        /// S3 bucket the transcription service can read.
        #[arg(long, env = "CAPTIONER_BUCKET")]
        bucket: String,

        /// Tab-separated manifest files.
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },
    /// Download every completed transcript not already in the results directory.
    Download,
    /// Convert downloaded transcripts into WebVTT.
    Webvtt {
        /// Transcript JSON files (default: everything in the results directory).
        inputs: Vec<PathBuf>,
    },
    /// Write index.json for manifest items that have a transcript.
    Index {
        /// Tab-separated manifest files.
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Where to write the index.
        #[arg(long, default_value = "index.json")]
        output: PathBuf,
    },
    /// List supported manifest languages.
    Languages,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("captioner=info".parse().unwrap()),
        )
        .with_writer(split_writer(std::io::stdout, std::io::stderr))
        .init();

    let options = PipelineOptions::new()
        .results_dir(cli.results_dir)
        .webvtt_dir(cli.webvtt_dir)
        .vocabulary_name(&cli.vocabulary)
        .item_delay(Duration::from_millis(cli.item_delay_ms));
    let region = cli
        .region
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(captioner::aws::region_from_env);

    match cli.command {
        Command::Transcribe { bucket, manifests } => {
            let summary =
                captioner::transcribe_manifests(&manifests, &bucket, &region, &options).await;
            let summary = or_exit(summary);
            println!(
                "Submitted {}, skipped {}, failed {}, malformed lines {}",
                summary.submitted, summary.skipped, summary.failed, summary.malformed
            );
        }
        Command::Download => {
            let summary = or_exit(captioner::download_transcripts(&region, &options).await);
            println!(
                "Downloaded {}, already present {}, failed {}",
                summary.downloaded, summary.skipped, summary.failed
            );
        }
        Command::Webvtt { inputs } => {
            let summary = if inputs.is_empty() {
                or_exit(captioner::convert_results(&options))
            } else {
                captioner::convert_transcripts(&inputs, &options)
            };
            println!(
                "Converted {}, already present {}, failed {}",
                summary.converted, summary.skipped, summary.failed
            );
        }
        Command::Index { manifests, output } => {
            let options = options.index_path(output);
            let count = or_exit(captioner::index_manifests(&manifests, &options));
            println!("Indexed {count} items in {}", options.index_path.display());
        }
        Command::Languages => {
            println!("{:<10} {}", "LANGUAGE", "CODE");
            println!("{:<10} {}", "--------", "----");
            for (name, code) in Language::supported() {
                println!("{name:<10} {code}");
            }
        }
    }
}

/// Progress (INFO and below) to `progress`, warnings and errors to `diagnostics`.
fn split_writer<P, D>(
    progress: P,
    diagnostics: D,
) -> impl for<'a> MakeWriter<'a> + Send + Sync + 'static
where
    P: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    D: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    diagnostics.with_max_level(Level::WARN).or_else(progress)
}

fn or_exit<T>(result: captioner::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

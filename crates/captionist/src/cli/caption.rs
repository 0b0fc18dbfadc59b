//! The `captionist caption` command.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use captionist_core::{
    discover, CaptionProviderKind, CaptionRecord, CaptionistError, Config, OutputFormat,
    OutputWriter,
};
use clap::Args;
use futures_util::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use super::SessionArgs;

/// Arguments for the `caption` command.
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file or directory of images
    #[arg(required = true)]
    pub input: PathBuf,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Images captioned concurrently
    #[arg(short, long, default_value = "4")]
    pub parallel: usize,

    /// Output format: json or jsonl (defaults to the config file setting)
    #[arg(short, long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Try this provider first: bedrock, sagemaker, or hf
    #[arg(long)]
    pub provider: Option<CaptionProviderKind>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("unknown format '{s}' (expected json or jsonl)"))
}

/// Per-run counters for the closing summary.
#[derive(Debug, Default, PartialEq)]
struct BatchTally {
    succeeded: u64,
    failed: u64,
    rate_limited: u64,
    bytes: u64,
}

impl BatchTally {
    fn record(&mut self, result: &Result<CaptionRecord, CaptionistError>) {
        match result {
            Ok(record) => {
                self.succeeded += 1;
                self.bytes += record.file_size;
            }
            Err(CaptionistError::RateLimited { .. }) => self.rate_limited += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn total(&self) -> u64 {
        self.succeeded + self.failed + self.rate_limited
    }
}

/// Execute the caption command.
pub async fn execute(args: CaptionArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(primary) = args.provider {
        config.provider.primary = primary;
    }
    let format = match args.format {
        Some(format) => format,
        None => OutputFormat::parse(&config.output.format).unwrap_or(OutputFormat::Json),
    };
    let pretty = config.output.pretty;

    let files = discover(&args.input);
    if files.is_empty() {
        anyhow::bail!("No JPEG or PNG images found at {}", args.input.display());
    }

    let service = Arc::new(super::open_service(config).await?);
    let session = super::signed_in(&service, &args.session).await?;
    let user_id: Arc<str> = Arc::from(session.user_id.as_str());
    tracing::info!(
        "Captioning {} image(s) for {} with up to {} in flight",
        files.len(),
        session.email,
        args.parallel.max(1)
    );

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, format, pretty);

    let progress = create_progress_bar(files.len() as u64)?;
    let semaphore = Arc::new(Semaphore::new(args.parallel.max(1)));
    let mut tasks = FuturesUnordered::new();

    for file in files {
        let service = service.clone();
        let semaphore = semaphore.clone();
        let user_id = user_id.clone();
        tasks.push(tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = semaphore.acquire_owned().await.ok();
            let result = service.caption_file(&user_id, &file.path).await;
            (file.path, result)
        }));
    }

    let start = Instant::now();
    let mut tally = BatchTally::default();

    while let Some(joined) = tasks.next().await {
        let (path, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("Caption task panicked: {e}");
                tally.failed += 1;
                progress.inc(1);
                continue;
            }
        };

        tally.record(&result);
        match result {
            Ok(record) => {
                progress.suspend(|| writer.write(&record))?;
            }
            Err(CaptionistError::RateLimited { .. }) => {
                tracing::warn!("Rate limited, skipped {:?}", path);
            }
            Err(e) => tracing::error!("Failed: {:?} - {}", path, e),
        }

        progress.inc(1);
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} img/sec", tally.total() as f64 / elapsed));
        }
    }

    progress.finish_and_clear();
    writer.finish()?;
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }

    print_summary(&tally, start.elapsed(), service.remaining_quota(&user_id));

    if tally.succeeded == 0 {
        anyhow::bail!("No images were captioned");
    }
    Ok(())
}

fn create_progress_bar(total: u64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("##-"),
    );
    pb.set_message("starting...");
    Ok(pb)
}

fn print_summary(tally: &BatchTally, elapsed: Duration, remaining_quota: u32) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        tally.succeeded as f64 / secs
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Captioned:    {:>8}", tally.succeeded);
    if tally.failed > 0 {
        eprintln!("    Failed:       {:>8}", tally.failed);
    }
    if tally.rate_limited > 0 {
        eprintln!("    Rate limited: {:>8}", tally.rate_limited);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", tally.total());
    eprintln!("    Uploaded:     {:>7.1} MB", tally.bytes as f64 / 1_000_000.0);
    eprintln!("    Duration:     {:>7.1}s", secs);
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Quota left:   {:>8}", remaining_quota);
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionist_core::CaptionError;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CaptionArgs,
    }

    #[test]
    fn test_parse_flags() {
        let harness = Harness::try_parse_from([
            "captionist",
            "./photos",
            "--parallel",
            "8",
            "--format",
            "JSONL",
            "--provider",
            "hf",
            "--session",
            "abc",
        ])
        .unwrap();
        let args = harness.args;
        assert_eq!(args.input, PathBuf::from("./photos"));
        assert_eq!(args.parallel, 8);
        assert_eq!(args.format, Some(OutputFormat::JsonLines));
        assert_eq!(args.provider, Some(CaptionProviderKind::PublicInferenceApi));
        assert_eq!(args.session.session.as_deref(), Some("abc"));
    }

    #[test]
    fn test_rejects_unknown_format_and_provider() {
        assert!(Harness::try_parse_from(["captionist", "a.jpg", "--format", "csv"]).is_err());
        assert!(Harness::try_parse_from(["captionist", "a.jpg", "--provider", "gpt"]).is_err());
    }

    #[test]
    fn test_tally_separates_rate_limits_from_failures() {
        let mut tally = BatchTally::default();
        tally.record(&Err(CaptionistError::RateLimited {
            user_id: "u".to_string(),
        }));
        tally.record(&Err(CaptionistError::Caption(
            CaptionError::AllProvidersExhausted { last_error: None },
        )));
        assert_eq!(
            tally,
            BatchTally {
                succeeded: 0,
                failed: 1,
                rate_limited: 1,
                bytes: 0
            }
        );
        assert_eq!(tally.total(), 2);
    }
}

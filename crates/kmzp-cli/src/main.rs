use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use kmzp_core::report::RunReport;
use kmzp_core::{ExtractOptions, LogStatus};

#[derive(Parser)]
#[command(name = "kmzp", version, about = "Extract placemark photos from KMZ files into a zip")]
struct Cli {
    /// KMZ files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory (default: next to each input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the "?-" marker prefix in output file names
    #[arg(long)]
    keep_structure: bool,

    /// Process every named placemark, not only "?-" marked ones
    #[arg(long = "all")]
    extract_all_images: bool,

    /// Overwrite an existing output archive instead of picking a new name
    #[arg(long)]
    force: bool,

    /// Write a JSON run report (a directory when several inputs are given)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print every log entry, not only warnings and errors
    #[arg(long)]
    show_logs: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = ExtractOptions {
        keep_structure: cli.keep_structure,
        extract_all_images: cli.extract_all_images,
    };

    let mut failed = 0usize;
    for input in &cli.files {
        if let Err(e) = process_one(&cli, input, &options) {
            eprintln!("Failed to extract photos from {}: {:#}", input.display(), e);
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, cli.files.len());
    }
    Ok(())
}

fn process_one(cli: &Cli, input: &Path, options: &ExtractOptions) -> anyhow::Result<()> {
    let t = std::time::Instant::now();

    let is_kmz = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("kmz"));
    if !is_kmz {
        tracing::warn!(path = %input.display(), "input does not have a .kmz extension");
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let progress = |stage: &str, current: u64, total: u64, message: &str| {
        pb.set_length(total);
        pb.set_position((current + 1).min(total));
        pb.set_prefix(stage.to_string());
        pb.set_message(message.to_string());
    };

    let result = kmzp_core::extract_file(input, options, &progress);
    pb.finish_and_clear();
    let result = result.with_context(|| format!("processing {}", input.display()))?;

    for entry in &result.logs {
        let shown = cli.show_logs || matches!(entry.status, LogStatus::Warning | LogStatus::Error);
        if shown {
            eprintln!("[{}] {}", status_label(entry.status), entry.message);
        }
    }

    let out_dir = match &cli.output {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let dest = out_dir.join(kmzp_core::output_file_name(input));
    let written = kmzp_core::writer::write_output_file(&dest, &result.output_archive, cli.force)
        .with_context(|| format!("writing {}", dest.display()))?;

    if let Some(report_path) = &cli.report {
        let path = if cli.files.len() > 1 {
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("kmz");
            report_path.join(format!("{}_report.json", stem))
        } else {
            report_path.clone()
        };
        let source = input.file_name().and_then(|n| n.to_str()).unwrap_or("input.kmz");
        RunReport::new(source, options, &result)
            .write(&path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    eprintln!(
        "Done! {} placemark(s), {} photo(s) -> {} ({:.2}s)",
        result.total_placemarks,
        result.total_photos,
        written.display(),
        t.elapsed().as_secs_f64()
    );

    Ok(())
}

fn status_label(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Info => "info",
        LogStatus::Success => "ok",
        LogStatus::Warning => "warn",
        LogStatus::Error => "error",
    }
}

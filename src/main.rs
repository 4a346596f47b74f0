use clap::{Parser, Subcommand};
use std::path::PathBuf;

use landwatch::config::ToolConfig;
use landwatch::terrain::TerrainClassifier;
use landwatch::{count, diff, fonts, iris, morph, output, prep, river, segment};

#[derive(Parser)]
#[command(name = "landwatch")]
#[command(about = "Terrain risk classification and image analysis toolkit")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file overriding the tuned detection constants
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify terrain risk in a satellite image, or in every image of a directory
    Classify {
        /// Image file or directory of images
        path: PathBuf,

        /// Also write a plain-text statistics report
        #[arg(long)]
        report: bool,

        /// TTF font for the legend text (system fonts are probed otherwise)
        #[arg(long, value_name = "FILE")]
        font: Option<PathBuf>,
    },

    /// Segment an image by color clustering
    Segment {
        image: PathBuf,

        #[arg(long, value_enum, default_value = "mean-shift")]
        method: segment::Method,

        /// Bandwidth quantile for mean shift, clamped to 0.01..=0.2
        #[arg(long, default_value_t = 0.1)]
        quantile: f32,

        /// Pixel sample size for the bandwidth estimate
        #[arg(long, default_value_t = 500)]
        samples: usize,

        /// Cluster count for k-means
        #[arg(short, default_value_t = 8)]
        k: usize,
    },

    /// Basic transforms (grayscale, filters, thresholds), chainable in order
    Prep {
        image: PathBuf,

        /// Operation to apply; repeat the flag to chain several
        #[arg(long = "op", value_enum, required = true)]
        ops: Vec<prep::PrepOp>,

        /// Fixed threshold level
        #[arg(long)]
        thresh: Option<u8>,

        /// Pick the threshold level with Otsu's method
        #[arg(long)]
        otsu: bool,

        /// Use the mean pixel value as threshold level
        #[arg(long)]
        auto: bool,

        /// Filter radius for blur and median
        #[arg(long, default_value_t = 2)]
        radius: u32,

        /// Block radius for the adaptive threshold
        #[arg(long, default_value_t = 5)]
        block_radius: u32,

        /// Write per-stage snapshots to this directory (must be empty)
        #[arg(long, value_name = "DIR")]
        snapshots: Option<PathBuf>,

        /// Write before/after luma histograms as a text sidecar
        #[arg(long)]
        histogram: bool,
    },

    /// Before/after change detection between two images
    Diff {
        before: PathBuf,
        after: PathBuf,

        /// Binary threshold applied to the difference
        #[arg(long, default_value_t = diff::DEFAULT_DIFF_THRESHOLD)]
        thresh: u8,
    },

    /// Staged binarize, erode and edge pipeline for images and NIfTI scans
    Morph {
        input: PathBuf,

        /// Binarization level in the normalized 0..1 range
        #[arg(long, default_value_t = morph::DEFAULT_BINARIZE_LEVEL)]
        level: f32,
    },

    /// Detect and crop the iris in an eye photograph
    Iris {
        image: PathBuf,

        #[arg(long, default_value_t = 30.0)]
        min_radius: f32,

        #[arg(long, default_value_t = 100.0)]
        max_radius: f32,
    },

    /// Count detected objects across a directory of video frames
    Count {
        /// Directory holding the frame images
        frames: PathBuf,

        /// Output directory for annotated frames and the counts table
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// TTF font for box labels
        #[arg(long, value_name = "FILE")]
        font: Option<PathBuf>,
    },

    /// River gauge stages and the civil-defense incident log
    River {
        #[command(subcommand)]
        action: RiverAction,
    },
}

#[derive(Subcommand)]
enum RiverAction {
    /// Classify a gauge level in meters
    Stage { level: f64 },

    /// Append an incident to the log
    Log {
        #[arg(long)]
        kind: String,

        #[arg(long)]
        location: String,

        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        #[arg(long, value_enum)]
        severity: river::Severity,

        /// Timestamp of the incident, defaults to now
        #[arg(long)]
        date: Option<String>,

        /// Gauge level at the time, in meters
        #[arg(long)]
        level: Option<f64>,

        #[arg(long, default_value = "incidents.json")]
        file: PathBuf,
    },

    /// Render the plain-text incident report
    Report {
        #[arg(long, default_value = "incidents.json")]
        file: PathBuf,

        /// Current gauge level to include in the summary
        #[arg(long)]
        level: Option<f64>,

        /// Write the report here instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    let cfg = ToolConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Classify { path, report, font } => {
            let font = fonts::load_font(font.as_deref());
            let classifier = TerrainClassifier::new(cfg.classifier)
                .with_font(font)
                .with_report(report);

            if path.is_dir() {
                let summary = classifier.process_batch(&path)?;
                println!(
                    "\n{}/{} image(s) classified successfully",
                    summary.processed,
                    summary.processed + summary.failed
                );
                if summary.processed == 0 {
                    anyhow::bail!("no image could be processed");
                }
            } else {
                let outcome = classifier.process_file(&path)?;
                println!("\nCoverage:");
                for stat in &outcome.stats {
                    println!("- {}: {:.2}%", stat.class.label(), stat.percentage);
                }
                for alert in &outcome.alerts {
                    println!("{alert}");
                }
                println!("\nSaved to {}", outcome.output_path.display());
                if let Some(report) = &outcome.report_path {
                    println!("Report saved to {}", report.display());
                }
            }
        }

        Command::Segment {
            image,
            method,
            quantile,
            samples,
            k,
        } => {
            let out = segment::segment_file(&image, method, quantile, samples, k)?;
            println!("Saved to {}", out.display());
        }

        Command::Prep {
            image,
            ops,
            thresh,
            otsu,
            auto,
            radius,
            block_radius,
            snapshots,
            histogram,
        } => {
            let level = match (thresh, otsu, auto) {
                (Some(level), _, _) => prep::ThresholdLevel::Fixed(level),
                (None, true, _) => prep::ThresholdLevel::Otsu,
                (None, false, true) => prep::ThresholdLevel::Auto,
                (None, false, false) => prep::ThresholdLevel::Fixed(127),
            };
            let opts = prep::PrepOptions {
                level,
                radius,
                block_radius,
                ..prep::PrepOptions::default()
            };
            let written = prep::prep_file(&image, &ops, &opts, snapshots, cli.verbose)?;
            for path in &written {
                println!("Saved to {}", path.display());
            }

            if histogram {
                let input_gray = output::load_image(&image)?.to_luma8();
                let result_gray = output::load_image(&written[0])?.to_luma8();
                let table = format!(
                    "# input\n{}# result\n{}",
                    prep::histogram_table(&input_gray),
                    prep::histogram_table(&result_gray)
                );
                let hist_path = output::sibling(&image, "histogram", "txt");
                std::fs::write(&hist_path, table)?;
                println!("Histogram saved to {}", hist_path.display());
            }
        }

        Command::Diff { before, after, thresh } => {
            let (diff_path, mask_path, changed_pct) = diff::diff_files(&before, &after, thresh)?;
            println!("Changed area: {changed_pct:.2}%");
            println!("Saved to {}", diff_path.display());
            println!("Change mask saved to {}", mask_path.display());
        }

        Command::Morph { input, level } => {
            let outcome = morph::morph_file(&input, level)?;
            for file in &outcome.stage_files {
                println!("Saved to {}", file.display());
            }
            println!("\nResults in {}", outcome.output_dir.display());
        }

        Command::Iris {
            image,
            min_radius,
            max_radius,
        } => {
            let detector = iris::IrisDetector {
                min_radius,
                max_radius,
                ..iris::IrisDetector::default()
            };
            let out = iris::iris_file(&image, &detector)?;
            println!("Saved to {}", out.display());
        }

        Command::Count { frames, out, font } => {
            let font = fonts::load_font(font.as_deref());
            let detector = count::ColorBlobDetector::new(cfg.count);
            let summary = count::count_frames(&frames, out, &detector, font.as_ref())?;

            println!("Processed {} frame(s), skipped {}", summary.frames, summary.skipped);
            println!("\nTotal objects per class:");
            for (class, total) in &summary.totals {
                println!("- {class}: {total}");
            }
            println!("\nAnnotated frames in {}", summary.output_dir.display());
            println!("Counts table: {}", summary.csv_path.display());
        }

        Command::River { action } => match action {
            RiverAction::Stage { level } => {
                println!("River level: {}", river::format_level(level));
            }
            RiverAction::Log {
                kind,
                location,
                latitude,
                longitude,
                severity,
                date,
                level,
                file,
            } => {
                let mut log = river::IncidentLog::load(&file)?;
                log.add(river::Incident {
                    date: date.unwrap_or_else(output::timestamp),
                    kind,
                    location,
                    latitude,
                    longitude,
                    severity,
                    river_level: level,
                });
                log.save()?;
                println!("Incident registered ({} on file)", log.incidents().len());
                if let Some(level) = level {
                    println!("River level: {}", river::format_level(level));
                }
            }
            RiverAction::Report { file, level, out } => {
                let log = river::IncidentLog::load(&file)?;
                let report = log.render_report(level);
                match out {
                    Some(path) => {
                        std::fs::write(&path, report)?;
                        println!("Report saved to {}", path.display());
                    }
                    None => print!("{report}"),
                }
            }
        },
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use cli::{PaintJob, load_strokes};
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};
use wallpaint::{DEFAULT_JPEG_QUALITY, DEFAULT_OPACITY, EncodeFormat, Rgb, SessionCommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recolor the wall in a photo
    Paint {
        /// Photo to recolor (JPEG or PNG)
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the preview
        #[arg(short, long)]
        output: PathBuf,
        /// Paint color as #RRGGBB
        #[arg(short, long)]
        color: Rgb,
        /// Paint opacity in [0, 1]
        #[arg(long, default_value_t = DEFAULT_OPACITY)]
        opacity: f32,
        /// JSON array of strokes used when no wall is detected
        #[arg(long)]
        strokes: Option<PathBuf>,
        /// Skip detection and paint the strokes only
        #[arg(long, requires = "strokes")]
        manual: bool,
        /// JPEG quality (1-100)
        #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
        quality: u8,
        /// Output format, guessed from the output extension by default
        #[arg(long)]
        format: Option<EncodeFormat>,
        /// Also write the wall mask as a grayscale PNG
        #[arg(long)]
        mask_output: Option<PathBuf>,
    },
    /// Run a job described by a TOML or JSON file
    Run {
        /// Path to the job file
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Print the JSON schemas of session commands and job files
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Paint {
            input,
            output,
            color,
            opacity,
            strokes,
            manual,
            quality,
            format,
            mask_output,
        } => {
            let mut job = PaintJob::new(input.to_string_lossy(), output.to_string_lossy(), color);
            job.opacity = opacity;
            job.quality = quality;
            job.format = format;
            job.mask_output = mask_output.map(|path| path.to_string_lossy().into_owned());
            if let Some(path) = strokes {
                job.strokes = load_strokes(&path)?;
                info!("Loaded {} strokes from {:?}", job.strokes.len(), path);
            }
            if manual {
                job.mode = wallpaint::SegmentationMode::Manual;
            }
            run_job(&job)?;
        }
        Commands::Run { job } => {
            run_job_file(&job)?;
        }
        Commands::Schema => {
            print_schemas()?;
        }
    }

    Ok(())
}

fn run_job_file(path: &Path) -> Result<()> {
    let job = PaintJob::from_file(path)?;
    info!("Job: {:?}", job);
    run_job(&job)
}

fn run_job(job: &PaintJob) -> Result<()> {
    let report = job.run()?;
    info!(
        "Wrote {} bytes to {} using the {} mask",
        report.bytes_written, job.output, report.mask_source
    );
    Ok(())
}

fn print_schemas() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&SessionCommand::schema())?);
    println!("{}", serde_json::to_string_pretty(&schemars::schema_for!(PaintJob))?);
    Ok(())
}

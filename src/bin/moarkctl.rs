use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use moark_api_proxy::artifact::{save, Artifact};
use moark_api_proxy::workflow::{
    self, GenerationRequest, ImageEditParams, ImageToVideoParams, TextToImageParams,
    TextToVideoParams, WorkflowOutcome,
};
use moark_api_proxy::workflow::image_to_video::{HaltReason, I2vOutcome};
use moark_api_proxy::workflow::text_to_video::T2vOutput;
use moark_api_proxy::workflow::RunReport;
use moark_api_proxy::{Config, GatewayClient, TaskResult};

#[derive(Parser, Debug)]
#[command(name = "moarkctl", about = "CLI for the Moark generation API proxy", version)]
struct Cli {
    /// Override UPSTREAM_BASE_URL
    #[arg(global = true, long)]
    base_url: Option<String>,

    /// Bearer credential; falls back to MOARK_API_KEY, then the key cache
    #[arg(global = true, long)]
    api_key: Option<String>,

    /// Route artifact downloads through a relay's /dl endpoint at this base URL
    #[arg(global = true, long, value_name = "URL")]
    relay_dl: Option<String>,

    /// Output directory (defaults to OUTPUT_DIR)
    #[arg(global = true, long, value_name = "PATH")]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Image generation workflows
    Image {
        #[command(subcommand)]
        cmd: ImageCmd,
    },
    /// Video generation workflows
    Video {
        #[command(subcommand)]
        cmd: VideoCmd,
    },
    /// Manage the remembered API key
    Key {
        #[command(subcommand)]
        cmd: KeyCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ImageCmd {
    /// Generate images from a text prompt (z-image-turbo)
    Gen {
        /// Prompt text
        prompt: String,
        /// Number of images, 1-4
        #[arg(long)]
        n: Option<String>,
        /// Resolution preset, e.g. "1:1 (1024x1024)"
        #[arg(long)]
        resolution: Option<String>,
    },
    /// Edit a pair of images guided by a prompt (Qwen-Image-Edit-2511)
    Edit {
        /// Prompt text
        prompt: String,
        /// Input image; pass exactly twice
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        /// Task type tag (id, style, pose, layout, color, background); repeatable
        #[arg(long = "task-type", value_name = "TYPE")]
        task_types: Vec<String>,
        /// Inference steps, 1-50
        #[arg(long)]
        steps: Option<String>,
        /// Guidance scale, 0-10
        #[arg(long)]
        guidance: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum VideoCmd {
    /// Animate a still image (Wan2_2-I2V-A14B), in 5-second segments
    I2v {
        /// Input image
        image: PathBuf,
        /// Prompt text
        prompt: String,
        /// Negative prompt
        #[arg(long)]
        negative: Option<String>,
        /// Width in pixels, 64-2048
        #[arg(long)]
        width: Option<String>,
        /// Height in pixels, 64-2048
        #[arg(long)]
        height: Option<String>,
        /// Inference steps, 1-100
        #[arg(long)]
        steps: Option<String>,
        /// Guidance scale, 0-20
        #[arg(long)]
        guidance: Option<String>,
        /// Frames per second, 1-60
        #[arg(long)]
        fps: Option<String>,
        /// Total duration in seconds, 0.5-60; split into 5-second segments
        #[arg(long)]
        duration: Option<String>,
        /// Explicit frame count, 1-300 (default: fps * 5)
        #[arg(long)]
        frames: Option<String>,
        /// Seed; negative or absent lets the backend pick
        #[arg(long)]
        seed: Option<String>,
        /// Ask the backend to watermark the output
        #[arg(long)]
        watermark: bool,
        /// Let the backend expand the prompt
        #[arg(long)]
        prompt_extend: bool,
        /// Bundle all segments into one zip after a multi-segment run
        #[arg(long)]
        zip: bool,
    },
    /// Generate video from a text prompt (HunyuanVideo-1.5)
    T2v {
        /// Prompt text
        prompt: String,
        /// Negative prompt
        #[arg(long)]
        negative: Option<String>,
        /// Aspect ratio, e.g. 16:9
        #[arg(long)]
        aspect_ratio: Option<String>,
        /// Inference steps, 1-10
        #[arg(long)]
        steps: Option<String>,
        /// Frame count, 81-241
        #[arg(long)]
        frames: Option<String>,
        /// Seed; must be a positive integer
        #[arg(long)]
        seed: String,
        /// Frames per second, 1-24
        #[arg(long)]
        fps: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCmd {
    /// Store the API key in the key cache file
    Remember { key: String },
    /// Delete the key cache file
    Clear,
    /// Print whether a key is cached
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();
    let conf = Config::new().expect("Failed to load config");

    if let Commands::Key { cmd } = &cli.command {
        return manage_key(cmd, &conf.key_cache_path).await;
    }

    let api_key = match resolve_api_key(&cli, &conf).await {
        Some(key) => key,
        None => {
            eprintln!("{}", moark_api_proxy::AppError::MissingApiKey);
            std::process::exit(2);
        }
    };

    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| conf.upstream_base_url.clone());
    let mut client = GatewayClient::new(base_url, api_key);
    if let Some(relay) = cli.relay_dl.clone() {
        client = client.with_relay_dl(relay);
    }

    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&conf.output_dir));

    let (request, bundle_segments) = match build_request(&cli.command) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    // Progress ticks go to stderr so stdout stays parseable.
    let (tx, mut rx) = mpsc::unbounded_channel::<moark_api_proxy::task::PollTick>();
    let printer = tokio::spawn(async move {
        while let Some(tick) = rx.recv().await {
            eprintln!(
                "polling... ({} checks, {}s elapsed)",
                tick.polls,
                tick.elapsed.as_secs()
            );
        }
    });

    let report = workflow::run(&client, &request, bundle_segments, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    match report {
        Ok(report) => render_report(report, &out_dir).await,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn manage_key(
    cmd: &KeyCmd,
    cache_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        KeyCmd::Remember { key } => {
            tokio::fs::write(cache_path, key.trim()).await?;
            println!("Key cached at {}", cache_path);
        }
        KeyCmd::Clear => {
            match tokio::fs::remove_file(cache_path).await {
                Ok(()) => println!("Key cache cleared"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    println!("No key cached");
                }
                Err(e) => return Err(e.into()),
            }
        }
        KeyCmd::Show => {
            let cached = tokio::fs::read_to_string(cache_path)
                .await
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            println!("{}", if cached { "key cached" } else { "no key cached" });
        }
    }
    Ok(())
}

/// Flag, then environment, then the cache file.
async fn resolve_api_key(cli: &Cli, conf: &Config) -> Option<String> {
    if let Some(key) = &cli.api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    if let Some(key) = &conf.api_key {
        return Some(key.clone());
    }
    tokio::fs::read_to_string(&conf.key_cache_path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_request(
    command: &Commands,
) -> moark_api_proxy::AppResult<(GenerationRequest, bool)> {
    match command {
        Commands::Image { cmd } => match cmd {
            ImageCmd::Gen { prompt, n, resolution } => Ok((
                GenerationRequest::TextToImage(TextToImageParams::new(
                    prompt,
                    n.as_deref(),
                    resolution.as_deref(),
                )?),
                false,
            )),
            ImageCmd::Edit {
                prompt,
                images,
                task_types,
                steps,
                guidance,
            } => Ok((
                GenerationRequest::ImageEdit(ImageEditParams::new(
                    prompt,
                    images.clone(),
                    task_types.clone(),
                    steps.as_deref(),
                    guidance.as_deref(),
                )?),
                false,
            )),
        },
        Commands::Video { cmd } => match cmd {
            VideoCmd::I2v {
                image,
                prompt,
                negative,
                width,
                height,
                steps,
                guidance,
                fps,
                duration,
                frames,
                seed,
                watermark,
                prompt_extend,
                zip,
            } => Ok((
                GenerationRequest::ImageToVideo(ImageToVideoParams::new(
                    image.clone(),
                    prompt,
                    negative.as_deref(),
                    width.as_deref(),
                    height.as_deref(),
                    steps.as_deref(),
                    guidance.as_deref(),
                    fps.as_deref(),
                    duration.as_deref(),
                    frames.as_deref(),
                    seed.as_deref(),
                    *watermark,
                    *prompt_extend,
                )?),
                *zip,
            )),
            VideoCmd::T2v {
                prompt,
                negative,
                aspect_ratio,
                steps,
                frames,
                seed,
                fps,
            } => Ok((
                GenerationRequest::TextToVideo(TextToVideoParams::new(
                    prompt,
                    negative.as_deref(),
                    aspect_ratio.as_deref(),
                    steps.as_deref(),
                    frames.as_deref(),
                    seed,
                    fps.as_deref(),
                )?),
                false,
            )),
        },
        Commands::Key { .. } => unreachable!("handled before workflow dispatch"),
    }
}

async fn save_and_print(
    artifact: &Artifact,
    out_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = save(artifact, out_dir).await?;
    println!("Saved {} ({} bytes)", path.display(), artifact.bytes.len());
    Ok(())
}

fn report_unresolved(task_id: &str, result: &TaskResult) -> ! {
    eprintln!("Task {} ended: {}", task_id, result.label());
    eprintln!("{}", result.raw());
    std::process::exit(1);
}

async fn render_report(
    report: RunReport,
    out_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    match report {
        RunReport::TextToImage(outcome) => {
            for artifact in &outcome.artifacts {
                save_and_print(artifact, out_dir).await?;
            }
            if outcome.skipped > 0 {
                eprintln!("{} result item(s) had no image data", outcome.skipped);
            }
            Ok(())
        }
        RunReport::ImageEdit(outcome) => match outcome {
            WorkflowOutcome::Completed(output) => {
                println!("Task {} succeeded", output.task_id);
                save_and_print(&output.artifact, out_dir).await
            }
            WorkflowOutcome::Unresolved { task_id, result } => {
                report_unresolved(&task_id, &result)
            }
        },
        RunReport::ImageToVideo(outcome) => match outcome {
            I2vOutcome::Completed {
                segments,
                bundle,
                bundle_error,
            } => {
                for segment in &segments {
                    println!(
                        "Segment {} (task {}, field '{}', {} attempt(s))",
                        segment.index, segment.task_id, segment.steps_field, segment.attempts
                    );
                    save_and_print(&segment.artifact, out_dir).await?;
                }
                if let Some(bundle) = &bundle {
                    save_and_print(bundle, out_dir).await?;
                }
                if let Some(err) = bundle_error {
                    // Secondary notice only; the run itself succeeded.
                    eprintln!("Bundling failed: {}", err);
                }
                Ok(())
            }
            I2vOutcome::Halted {
                segments,
                failed_segment,
                reason,
            } => {
                for segment in &segments {
                    save_and_print(&segment.artifact, out_dir).await?;
                }
                match reason {
                    HaltReason::Task(result) => {
                        eprintln!("Segment {} ended: {}", failed_segment, result.label());
                        eprintln!("{}", result.raw());
                    }
                    HaltReason::Artifact(err) => {
                        eprintln!("Segment {} download failed: {}", failed_segment, err);
                    }
                }
                std::process::exit(1);
            }
        },
        RunReport::TextToVideo(outcome) => match outcome {
            WorkflowOutcome::Completed(success) => {
                println!("Task {} succeeded", success.task_id);
                match success.output {
                    T2vOutput::Video(artifact) => save_and_print(&artifact, out_dir).await,
                    T2vOutput::Text(text) => {
                        println!("{}", text);
                        Ok(())
                    }
                    T2vOutput::Empty => {
                        println!("Success, but the task returned no output");
                        Ok(())
                    }
                }
            }
            WorkflowOutcome::Unresolved { task_id, result } => {
                report_unresolved(&task_id, &result)
            }
        },
    }
}

//! stegcanvas CLI: hide a file or text in a PNG, recover it, and inspect capacity.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stegcanvas_lib::capacity::{self, min_dimensions_for};
use stegcanvas_lib::classify::PayloadKind;
use stegcanvas_lib::codec::probe_depth;
use stegcanvas_lib::config::Settings;
use stegcanvas_lib::header::PayloadHeader;
use stegcanvas_lib::worker::{spawn_decode, spawn_encode, RunEvent};
use stegcanvas_lib::{DecodeRequest, EncodeRequest, StegoDecodeResult, StegoEncodeResult};

const TEXT_PAYLOAD_NAME: &str = "message.txt";
const TEXT_PAYLOAD_TYPE: &str = "text/plain";

/// Hide arbitrary files or text in the pixels of a PNG image.
#[derive(Parser)]
#[command(name = "stegcanvas-cli")]
#[command(version)]
#[command(about = "LSB steganography with auto-sized covers", long_about = None)]
struct Cli {
    /// Settings file (defaults to <config dir>/stegcanvas/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hide a payload in a cover image (or in generated noise art)
    Encode {
        /// Cover image; random pointillist art is generated when omitted
        #[arg(short, long)]
        cover: Option<PathBuf>,

        /// Output PNG path
        #[arg(short, long, default_value = "stego.png")]
        output: PathBuf,

        /// File to hide
        #[arg(short, long, conflicts_with_all = ["text", "payload_base64"])]
        file: Option<PathBuf>,

        /// Text message to hide (stored as message.txt)
        #[arg(short, long, conflicts_with = "payload_base64")]
        text: Option<String>,

        /// Raw payload as base64
        #[arg(long)]
        payload_base64: Option<String>,

        /// Name recorded for the payload
        #[arg(long)]
        name: Option<String>,

        /// MIME type recorded for the payload
        #[arg(long = "type")]
        payload_type: Option<String>,

        /// Low bits used per color channel
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=8))]
        bits: Option<u8>,

        /// Fail instead of growing the canvas when the payload does not fit
        #[arg(long)]
        no_auto_expand: bool,

        /// Largest canvas side the output may have
        #[arg(long)]
        max_canvas: Option<u32>,

        /// Allow more than 4 bits per channel
        #[arg(long)]
        no_preserve_quality: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recover a payload from a stego PNG
    Decode {
        /// Stego image
        image: PathBuf,

        /// Bits per channel used when encoding, or "auto" to probe
        #[arg(short, long, default_value = "auto")]
        bits: String,

        /// Where to write the payload (defaults to the recorded name; text goes to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Largest carrier side accepted
        #[arg(long)]
        max_canvas: Option<u32>,

        /// Print the result as JSON instead of writing files
        #[arg(long)]
        json: bool,
    },
    /// Show how much an image can hold, or how big a canvas a payload needs
    Capacity {
        /// Image to measure
        #[arg(short, long, conflicts_with_all = ["width", "height"])]
        image: Option<PathBuf>,

        #[arg(long, requires = "height")]
        width: Option<u32>,

        #[arg(long, requires = "width")]
        height: Option<u32>,

        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=8))]
        bits: Option<u8>,

        /// Payload size in bytes; prints the minimal canvas for it
        #[arg(long)]
        payload_size: Option<u64>,

        #[arg(long)]
        max_canvas: Option<u32>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stegcanvas_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;
    match cli.command {
        Commands::Encode {
            cover,
            output,
            file,
            text,
            payload_base64,
            name,
            payload_type,
            bits,
            no_auto_expand,
            max_canvas,
            no_preserve_quality,
            json,
        } => {
            let mut settings = settings;
            if let Some(bits) = bits {
                settings.bits_per_channel = bits;
            }
            if no_auto_expand {
                settings.auto_expand = false;
            }
            if let Some(max) = max_canvas {
                settings.max_canvas_dimension = max;
            }
            if no_preserve_quality {
                settings.preserve_quality = false;
            }

            let (payload, default_name, default_type) = if let Some(path) = file {
                let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let mime = guess_type(&path).to_string();
                (bytes, file_name, mime)
            } else if let Some(text) = text {
                (text.into_bytes(), TEXT_PAYLOAD_NAME.to_string(), TEXT_PAYLOAD_TYPE.to_string())
            } else if let Some(b64) = payload_base64 {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(b64.trim())
                    .context("decoding --payload-base64")?;
                (bytes, String::new(), String::new())
            } else {
                bail!("encode requires --file, --text or --payload-base64");
            };

            let cover_image = match &cover {
                Some(path) => Some(fs::read(path).with_context(|| format!("reading {}", path.display()))?),
                None => None,
            };
            let request = EncodeRequest {
                cover_image,
                payload,
                payload_name: Some(name.unwrap_or(default_name)),
                payload_type: Some(payload_type.unwrap_or(default_type)),
                config: settings.encoding_config(),
            };
            run_encode(request, &output, json)
        }
        Commands::Decode {
            image,
            bits,
            output,
            max_canvas,
            json,
        } => {
            let bytes = fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            let max_canvas_dimension = max_canvas.unwrap_or(settings.max_canvas_dimension);
            let bits = if bits.eq_ignore_ascii_case("auto") {
                probe_depth(&bytes, max_canvas_dimension)?.ok_or_else(|| anyhow!("no stegcanvas header found at any bit depth"))?
            } else {
                bits.parse::<u8>().with_context(|| format!("invalid --bits value {bits:?}"))?
            };
            let request = DecodeRequest {
                image: bytes,
                bits_per_channel: bits,
                max_canvas_dimension,
            };
            run_decode(request, output.as_deref(), json)
        }
        Commands::Capacity {
            image,
            width,
            height,
            bits,
            payload_size,
            max_canvas,
        } => {
            let bits = bits.unwrap_or(settings.bits_per_channel);
            let max = max_canvas.unwrap_or(settings.max_canvas_dimension);
            run_capacity(image.as_deref(), width.zip(height), bits, payload_size, max)
        }
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match Settings::default_path() {
            Some(p) => p,
            None => return Ok(Settings::default()),
        },
    };
    Settings::load(&path).with_context(|| format!("loading settings from {}", path.display()))
}

fn print_progress(p: f32) {
    eprint!("\r{:5.1}%", p * 100.0);
}

fn run_encode(request: EncodeRequest, output: &Path, json: bool) -> Result<()> {
    let bits = request.config.bits_per_channel;
    match spawn_encode(request).wait(print_progress) {
        Some(RunEvent::Encoded(image)) => {
            eprintln!("\r{:5.1}%", 100.0);
            fs::write(output, &image.png).with_context(|| format!("writing {}", output.display()))?;
            if json {
                let result = StegoEncodeResult {
                    ok: true,
                    path: Some(output.display().to_string()),
                    capacity: Some(capacity::report(image.width, image.height, bits)),
                    error: None,
                };
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                eprintln!(
                    "Wrote {} ({}x{}, {} bits/channel)",
                    output.display(),
                    image.width,
                    image.height,
                    bits
                );
            }
            Ok(())
        }
        Some(RunEvent::Failed(report)) => {
            eprintln!();
            if json {
                let result = StegoEncodeResult {
                    ok: false,
                    path: None,
                    capacity: None,
                    error: Some(report.clone()),
                };
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            bail!("{:?}: {}", report.error, report.message)
        }
        other => bail!("encode worker ended unexpectedly: {other:?}"),
    }
}

fn run_decode(request: DecodeRequest, output: Option<&Path>, json: bool) -> Result<()> {
    match spawn_decode(request).wait(print_progress) {
        Some(RunEvent::Decoded(decoded)) => {
            eprintln!("\r{:5.1}%", 100.0);
            if json {
                let result = StegoDecodeResult::from_payload(&decoded);
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            match (decoded.kind, output) {
                (PayloadKind::Text, None) => {
                    io::stdout().write_all(&decoded.bytes)?;
                }
                (_, out) => {
                    let path = match out {
                        Some(p) => p.to_path_buf(),
                        None => safe_file_name(&decoded.suggested_name),
                    };
                    fs::write(&path, &decoded.bytes).with_context(|| format!("writing {}", path.display()))?;
                    eprintln!(
                        "Wrote {} ({} bytes, type {:?})",
                        path.display(),
                        decoded.byte_length,
                        decoded.declared_type
                    );
                }
            }
            Ok(())
        }
        Some(RunEvent::Failed(report)) => {
            eprintln!();
            if json {
                let result = StegoDecodeResult::failed(report.clone());
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            bail!("{:?}: {}", report.error, report.message)
        }
        other => bail!("decode worker ended unexpectedly: {other:?}"),
    }
}

fn run_capacity(
    image: Option<&Path>,
    dims: Option<(u32, u32)>,
    bits: u8,
    payload_size: Option<u64>,
    max: u32,
) -> Result<()> {
    let dims = match (image, dims) {
        (Some(path), _) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Some(stegcanvas_lib::canvas::load(&bytes)?.dimensions())
        }
        (None, dims) => dims,
    };
    let mut out = serde_json::Map::new();
    if let Some((w, h)) = dims {
        out.insert("image".into(), serde_json::to_value(capacity::report(w, h, bits))?);
    }
    if let Some(size) = payload_size {
        // Header overhead with an empty name and type; a real name adds its length.
        let overhead = PayloadHeader::for_payload(&[], "", "")?.encoded_len() as u64;
        let (w, h) = min_dimensions_for(size + overhead, bits, dims, max)?;
        out.insert("minimal_canvas".into(), serde_json::to_value(capacity::report(w, h, bits))?);
    }
    if out.is_empty() {
        bail!("capacity needs --image, --width/--height or --payload-size");
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Keeps only the final path component of a recorded name.
fn safe_file_name(name: &str) -> PathBuf {
    Path::new(name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(stegcanvas_lib::codec::DEFAULT_DECODED_NAME))
}

fn guess_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "zst" => "application/zstd",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

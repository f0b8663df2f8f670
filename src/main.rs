//! xtc-encoder: convert page images to XTC/XTCH containers for XTEink
//! readers, or inspect an existing container.
//!
//! Archive extraction, PDF rasterization and video sampling live in
//! separate tools; this binary consumes image files (or a directory of
//! page images in filename order) and emits one container.

use clap::Parser;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use xtc_encoder::codec::{parse_container, CHUNK_HEADER_LEN};
use xtc_encoder::image::geom::Margins;
use xtc_encoder::{
    BookMetadata, ConversionOptions, Device, DitherAlgorithm, ImageMode, Orchestrator,
    Orientation, PageFilter, RasterFrame, Result, SourceType, SplitMode, XtcError,
};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "xtc-encoder")]
#[command(about = "Convert page images to XTC/XTCH for XTEink e-ink readers")]
#[command(version)]
struct Args {
    /// Input image file, directory of page images, or container file
    /// (with --inspect).
    input: PathBuf,

    /// Output file path. Defaults to the input name with .xtc/.xtch.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Target device geometry.
    #[arg(long, value_enum, default_value_t = Device::X4)]
    device: Device,

    /// Produce a 2-bit (4-level) XTCH container.
    #[arg(long = "2bit")]
    two_bit: bool,

    /// Dithering algorithm.
    #[arg(long, value_enum, default_value_t = DitherAlgorithm::Stucki)]
    dither: DitherAlgorithm,

    /// Histogram-stretch intensity: 0, 2, 4, 6 or 8.
    #[arg(long, default_value_t = 0)]
    contrast: u8,

    /// Gamma correction, clamped to [0.1, 3.0].
    #[arg(long, default_value_t = 1.0)]
    gamma: f32,

    /// Invert colors before grayscale conversion.
    #[arg(long)]
    invert: bool,

    /// Pad with black instead of white.
    #[arg(long = "pad-black")]
    pad_black: bool,

    /// Reading orientation. Defaults to landscape for comics and
    /// portrait for single images and video.
    #[arg(long, value_enum)]
    orientation: Option<Orientation>,

    /// Landscape split behaviour.
    #[arg(long = "split", value_enum, default_value_t = SplitMode::Overlap)]
    split: SplitMode,

    /// Treat input as a continuous vertical strip (webtoons).
    #[arg(long)]
    manhwa: bool,

    /// Manhwa slice overlap percentage: 30, 50 or 75.
    #[arg(long, default_value_t = 50)]
    overlap: u32,

    /// Add a rotated overview page before each page's pieces.
    #[arg(long = "sideways")]
    sideways: bool,

    /// Add an upright overview page before each page's pieces.
    #[arg(long = "include-overviews")]
    include_overviews: bool,

    /// Single-image scaling mode.
    #[arg(long = "image-mode", value_enum, default_value_t = ImageMode::Cover)]
    image_mode: ImageMode,

    /// Frame sampling rate for video sources.
    #[arg(long, default_value_t = 1.0)]
    fps: f32,

    /// Stream the container: header and index before page data.
    #[arg(long)]
    streamed: bool,

    /// Source kind. Inferred from the input when omitted.
    #[arg(long = "source-type", value_enum)]
    source_type: Option<SourceType>,

    /// Margin crop: "auto", a percentage, or "horizontal,vertical".
    #[arg(long)]
    margin: Option<String>,

    /// First source page to process (1-indexed).
    #[arg(long)]
    start: Option<u32>,

    /// Last source page to process (1-indexed).
    #[arg(long)]
    stop: Option<u32>,

    /// Source pages to skip, comma separated.
    #[arg(long, value_delimiter = ',')]
    skip: Vec<u32>,

    /// Write book metadata with one TOC chapter per source page.
    #[arg(long = "toc-pages")]
    toc_pages: bool,

    /// Book title for the metadata block. Defaults to the output stem
    /// when metadata is requested.
    #[arg(long)]
    title: Option<String>,

    /// Creation timestamp stored in the metadata block. Defaults to the
    /// current Unix time.
    #[arg(long = "create-time")]
    create_time: Option<u32>,

    /// Parse and summarize an existing .xtc/.xtch file instead of
    /// converting.
    #[arg(long)]
    inspect: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &XtcError) -> i32 {
    match err {
        XtcError::InvalidOption(_) => 2,
        XtcError::FrameDecode(_) => 3,
        XtcError::MalformedContainer(_) | XtcError::MalformedChunk(_) => 4,
        XtcError::Cancelled => 5,
        _ => 1,
    }
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        return Err(XtcError::InvalidOption(format!(
            "input path {} does not exist",
            args.input.display()
        )));
    }

    if args.inspect || is_container_path(&args.input) {
        return inspect(&args.input);
    }

    let source_type = args.source_type.unwrap_or(if args.input.is_dir() {
        SourceType::Cbz
    } else {
        SourceType::Image
    });

    let opts = build_options(args, source_type)?;
    let orchestrator = Orchestrator::new(opts)?;

    let frames = load_frames(&args.input)?;
    info!(frames = frames.len(), "input decoded");

    let output = output_path(args);
    let metadata = build_metadata(args, &output);

    if args.streamed {
        let file = std::fs::File::create(&output)?;
        match orchestrator.convert_streamed(&frames, metadata.as_ref(), file) {
            Ok(_) => {}
            Err(err) => {
                // A partially streamed file is invalid by definition.
                let _ = std::fs::remove_file(&output);
                return Err(err);
            }
        }
    } else {
        let bytes = orchestrator.convert(&frames, metadata.as_ref())?;
        std::fs::write(&output, bytes)?;
    }

    info!(output = %output.display(), "container written");
    Ok(())
}

fn is_container_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("xtc") | Some("xtch")
    )
}

fn build_options(args: &Args, source_type: SourceType) -> Result<ConversionOptions> {
    let margins = match args.margin.as_deref() {
        None => Margins::none(),
        Some(value) => parse_margins(value)?,
    };

    Ok(ConversionOptions {
        device: args.device,
        source_type,
        two_bit: args.two_bit,
        dither: args.dither,
        contrast: args.contrast,
        gamma: args.gamma,
        invert: args.invert,
        pad_black: args.pad_black,
        orientation: args
            .orientation
            .unwrap_or_else(|| source_type.default_orientation()),
        split_mode: args.split,
        include_overviews: args.include_overviews,
        sideways_overviews: args.sideways,
        manhwa: args.manhwa,
        manhwa_overlap_percent: args.overlap,
        image_mode: args.image_mode,
        video_fps: args.fps,
        margins,
        streamed: args.streamed,
        emit_previews: false,
        toc_pages: args.toc_pages,
        page_filter: PageFilter {
            start: args.start,
            stop: args.stop,
            skip: args.skip.clone(),
        },
    })
}

fn parse_margins(value: &str) -> Result<Margins> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(Margins::Auto);
    }
    let parts: Vec<&str> = value.split(',').collect();
    let parse = |s: &str| -> Result<f32> {
        s.trim()
            .parse::<f32>()
            .map_err(|_| XtcError::InvalidOption(format!("margin value '{}' is not a number", s)))
    };
    match parts.as_slice() {
        [both] => {
            let v = parse(both)?;
            Ok(Margins::Percent {
                horizontal: v,
                vertical: v,
            })
        }
        [h, v] => Ok(Margins::Percent {
            horizontal: parse(h)?,
            vertical: parse(v)?,
        }),
        _ => Err(XtcError::InvalidOption(format!(
            "margin '{}' must be 'auto', a percentage, or 'h,v'",
            value
        ))),
    }
}

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decodes the input into RGBA frames. Directories are read in filename
/// order; an undecodable frame is skipped in a batch and fatal for a
/// single image.
fn load_frames(input: &Path) -> Result<Vec<RasterFrame>> {
    let paths: Vec<PathBuf> = if input.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_path(p))
            .collect();
        entries.sort();
        entries
    } else {
        vec![input.to_path_buf()]
    };

    if paths.is_empty() {
        return Err(XtcError::FrameDecode(format!(
            "no page images found in {}",
            input.display()
        )));
    }

    let single = paths.len() == 1;
    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        match decode_frame(path) {
            Ok(frame) => frames.push(frame),
            Err(err) if single => return Err(err),
            Err(err) => warn!(page = %path.display(), "skipping undecodable page: {}", err),
        }
    }

    if frames.is_empty() {
        return Err(XtcError::FrameDecode(format!(
            "no decodable page images in {}",
            input.display()
        )));
    }
    Ok(frames)
}

fn decode_frame(path: &Path) -> Result<RasterFrame> {
    let decoded = image::open(path)
        .map_err(|e| XtcError::FrameDecode(format!("{}: {}", path.display(), e)))?;
    let rgba = decoded.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(RasterFrame::from_rgba_bytes(w, h, rgba.as_raw()))
}

fn output_path(args: &Args) -> PathBuf {
    if let Some(out) = &args.output {
        return out.clone();
    }
    let ext = if args.two_bit { "xtch" } else { "xtc" };
    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    args.input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}.{}", stem, ext))
}

fn build_metadata(args: &Args, output: &Path) -> Option<BookMetadata> {
    if args.title.is_none() && !args.toc_pages && args.create_time.is_none() {
        return None;
    }
    let title = args.title.clone().unwrap_or_else(|| {
        output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let create_time = args.create_time.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    });
    Some(BookMetadata {
        title,
        create_time,
        ..Default::default()
    })
}

/// Parses an existing container and prints a summary. Every chunk header
/// and digest is verified along the way.
fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let parsed = parse_container(&bytes).map_err(XtcError::from)?;
    let info = &parsed.info;

    println!(
        "{}: {} v{}, {} pages",
        path.display(),
        if info.two_bit { "XTCH (2-bit)" } else { "XTC (1-bit)" },
        info.version,
        info.page_count
    );
    println!(
        "  offsets: metadata {} index {} data {}",
        info.metadata_offset, info.index_offset, info.data_offset
    );

    if let Some(meta) = &info.metadata {
        println!("  title: {:?}", meta.title);
        if !meta.author.is_empty() {
            println!("  author: {:?}", meta.author);
        }
        println!("  createTime: {}", meta.create_time);
        for entry in &meta.toc {
            println!(
                "  chapter {:?}: pages {}..={}",
                entry.title, entry.start_page, entry.end_page
            );
        }
    }

    for i in 0..info.page_count as usize {
        let header = parsed.chunk_header(i).map_err(XtcError::from)?;
        let payload = &parsed.chunk_bytes(i)[CHUNK_HEADER_LEN..];
        let digest = Md5::digest(payload);
        if header.digest != digest[..8] {
            return Err(XtcError::MalformedChunk(format!(
                "page {} digest mismatch",
                i + 1
            )));
        }
    }
    println!("  all {} chunks verified", info.page_count);
    Ok(())
}

//! xdsmask command-line interface.
//!
//! Headless access to the geometry tools, the mask session and the
//! processing engine launcher.
#![allow(
    clippy::uninlined_format_args,
    clippy::too_many_lines,
    clippy::struct_excessive_bools
)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use xdsmask_core::{
    compute_gaps, compute_ice_rings, compute_rings, fit_circle, AnnotationEvent,
    AnnotationSession, CancelScope, DetectorGeometry, GapGridConfig, MaskState, Mode, Notice,
    Point, ResolutionRing, RingShape, SessionPhase, ShapeKind, XdsParam,
};
use xdsmask_io::{
    load_state, read_image_header, save_state, ConversionRequest, ConversionTask,
    ProcessingCommand, ProcessingJob, ProcessingParameters, ProgressUpdate, Slab, ToolConfig,
};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    XdsmaskIo(#[from] xdsmask_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] xdsmask_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session ended without a result")]
    SessionOpen,

    #[error("processing stalled after stage {0}")]
    Stalled(String),
}

fn parse_point(s: &str) -> std::result::Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad X in '{s}': {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad Y in '{s}': {e}"))?;
    Ok(Point::new(x, y))
}

fn parse_param(s: &str) -> std::result::Result<XdsParam, String> {
    s.parse::<XdsParam>().map_err(|e| e.to_string())
}

/// Detector geometry, optionally seeded from a state file.
#[derive(Args, Debug, Clone, Default)]
struct GeometryArgs {
    /// State file whose geometry is used as the starting point
    #[arg(long)]
    state: Option<PathBuf>,

    /// Sample to detector distance (mm)
    #[arg(long)]
    distance: Option<f64>,

    /// Wavelength (Å)
    #[arg(long)]
    wavelength: Option<f64>,

    /// Pixel size in X and Y (mm)
    #[arg(long)]
    pixel_size: Option<f64>,

    /// Pixel size in Y when it differs from X (mm)
    #[arg(long)]
    pixel_size_y: Option<f64>,

    /// Number of pixels in X
    #[arg(long)]
    nx: Option<u32>,

    /// Number of pixels in Y
    #[arg(long)]
    ny: Option<u32>,

    /// Detector swing angle (degrees)
    #[arg(long, allow_hyphen_values = true)]
    two_theta: Option<f64>,

    /// Beam centre as X,Y (pixels)
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    beam: Option<Point>,
}

impl GeometryArgs {
    fn resolve(&self) -> Result<DetectorGeometry> {
        let mut geometry = match &self.state {
            Some(path) => load_state(path)?.geometry,
            None => DetectorGeometry::default(),
        };
        let recentre = self.beam.is_none() && (self.nx.is_some() || self.ny.is_some());
        if let Some(v) = self.distance {
            geometry.distance_mm = v;
        }
        if let Some(v) = self.wavelength {
            geometry.wavelength_a = v;
        }
        if let Some(v) = self.pixel_size {
            geometry.pixel_size_x_mm = v;
            geometry.pixel_size_y_mm = v;
        }
        if let Some(v) = self.pixel_size_y {
            geometry.pixel_size_y_mm = v;
        }
        if let Some(v) = self.nx {
            geometry.pixel_count_x = v;
        }
        if let Some(v) = self.ny {
            geometry.pixel_count_y = v;
        }
        if let Some(v) = self.two_theta {
            geometry.two_theta_deg = v;
        }
        if let Some(beam) = self.beam {
            geometry.beam_centre_px = beam;
        } else if recentre {
            geometry.beam_centre_px = geometry.panel_centre();
        }
        geometry.validate()?;
        Ok(geometry)
    }
}

/// Gap grid options.
#[derive(Args, Debug, Clone)]
struct GapArgs {
    /// Number of module gaps along X
    #[arg(long, default_value = "0")]
    gaps_x: u32,

    /// Number of module gaps along Y
    #[arg(long, default_value = "0")]
    gaps_y: u32,

    /// Module spacing scale along X (%)
    #[arg(long, default_value = "100")]
    gap_scale_x: f64,

    /// Module spacing scale along Y (%)
    #[arg(long, default_value = "100")]
    gap_scale_y: f64,

    /// Grid offset along X (% of panel)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    gap_offset_x: f64,

    /// Grid offset along Y (% of panel)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    gap_offset_y: f64,

    /// Gap width along X (pixels)
    #[arg(long, default_value = "7")]
    gap_width_x: f64,

    /// Gap width along Y (pixels)
    #[arg(long, default_value = "17")]
    gap_width_y: f64,
}

impl Default for GapArgs {
    fn default() -> Self {
        let defaults = GapGridConfig::default();
        Self {
            gaps_x: defaults.count_x,
            gaps_y: defaults.count_y,
            gap_scale_x: defaults.scale_x_pct,
            gap_scale_y: defaults.scale_y_pct,
            gap_offset_x: defaults.offset_x_pct,
            gap_offset_y: defaults.offset_y_pct,
            gap_width_x: defaults.width_x,
            gap_width_y: defaults.width_y,
        }
    }
}

impl GapArgs {
    fn config(&self) -> Result<GapGridConfig> {
        let config = GapGridConfig {
            count_x: self.gaps_x,
            count_y: self.gaps_y,
            scale_x_pct: self.gap_scale_x,
            scale_y_pct: self.gap_scale_y,
            offset_x_pct: self.gap_offset_x,
            offset_y_pct: self.gap_offset_y,
            width_x: self.gap_width_x,
            width_y: self.gap_width_y,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Processing engine options.
#[derive(Args, Debug, Clone)]
struct ProcessingArgs {
    /// Directory holding the images
    #[arg(short = 'I', long)]
    image_dir: PathBuf,

    /// Output directory
    #[arg(short = 'd', long)]
    output_dir: PathBuf,

    /// Worker threads for the engine
    #[arg(long)]
    nthreads: Option<u32>,

    /// Low resolution limit (Å)
    #[arg(long, requires = "high_res")]
    low_res: Option<f64>,

    /// High resolution limit (Å)
    #[arg(long, requires = "low_res")]
    high_res: Option<f64>,

    /// Space group, e.g. P212121
    #[arg(long)]
    symm: Option<String>,

    /// Unit cell as six comma-separated numbers
    #[arg(long, value_delimiter = ',')]
    cell: Vec<f64>,

    /// Macro passed with -M (repeatable)
    #[arg(short = 'M', long = "macro")]
    macros: Vec<String>,

    /// Extra key=value token (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    extra: Vec<XdsParam>,

    /// Processing program
    #[arg(long, default_value = "process")]
    program: PathBuf,
}

impl ProcessingArgs {
    fn parameters(&self) -> Result<ProcessingParameters> {
        let cell = match self.cell.as_slice() {
            [] => None,
            values => Some(<[f64; 6]>::try_from(values).map_err(|_| {
                CliError::InvalidArgument(format!(
                    "--cell needs 6 values, got {}",
                    values.len()
                ))
            })?),
        };
        Ok(ProcessingParameters {
            image_dir: self.image_dir.clone(),
            output_dir: self.output_dir.clone(),
            nthreads: self.nthreads,
            resolution: self.low_res.zip(self.high_res),
            space_group: self.symm.clone(),
            cell,
            macros: self.macros.clone(),
            extra: self.extra.clone(),
        })
    }
}

/// Click behaviour for replayed sessions.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClickMode {
    /// Report resolution at each click
    Probe,
    /// Fit the beam centre from three clicks
    Beam,
    /// Draw mask shapes
    Draw,
    /// Delete the mask under each click
    Delete,
}

impl From<ClickMode> for Mode {
    fn from(mode: ClickMode) -> Self {
        match mode {
            ClickMode::Probe => Mode::Probe,
            ClickMode::Beam => Mode::FitBeam,
            ClickMode::Draw => Mode::Draw,
            ClickMode::Delete => Mode::Delete,
        }
    }
}

/// Mask shape selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    Rectangle,
    Ellipse,
    Circle,
    Quadrilateral,
}

impl From<Shape> for ShapeKind {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Rectangle => ShapeKind::Rectangle,
            Shape::Ellipse => ShapeKind::Ellipse,
            Shape::Circle => ShapeKind::Circle,
            Shape::Quadrilateral => ShapeKind::Quadrilateral,
        }
    }
}

/// What to keep when a replayed session is not accepted.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CancelMode {
    /// Drop masks drawn in this session
    DiscardNew,
    /// Return the state unchanged
    RevertAll,
}

/// Untrusted-region masking and beam-centre fitting for diffraction images.
#[derive(Parser)]
#[command(name = "xdsmask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (overrides RUST_LOG default)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read detector geometry from an image header and write a new state file
    Init {
        /// Detector image
        image: PathBuf,

        /// Output state file
        #[arg(short, long)]
        output: PathBuf,

        /// Seed masks and beam from earlier key=value tokens
        #[arg(long = "token", value_parser = parse_param)]
        tokens: Vec<XdsParam>,

        /// Image-info program
        #[arg(long, default_value = "imginfo")]
        imginfo: PathBuf,
    },

    /// Print the header values reported for an image
    Header {
        /// Detector image
        image: PathBuf,

        /// Image-info program
        #[arg(long, default_value = "imginfo")]
        imginfo: PathBuf,
    },

    /// Convert a detector image to a PNG raster
    Convert {
        /// Detector image
        image: PathBuf,

        /// Output PNG
        output: PathBuf,

        /// Overload threshold
        #[arg(long)]
        overload: Option<f64>,

        /// Frame index inside a multi-frame container (1-based)
        #[arg(long, requires = "slabs")]
        slab: Option<u32>,

        /// Frames summed per raster
        #[arg(long)]
        slabs: Option<u32>,

        /// Converter program
        #[arg(long, default_value = "adxv")]
        converter: PathBuf,
    },

    /// List resolution (and optionally ice) rings
    Rings {
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Number of resolution rings
        #[arg(short, long, default_value = "8")]
        count: u32,

        /// Also list ice rings
        #[arg(long)]
        ice: bool,
    },

    /// Resolution at a detector pixel
    Probe {
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Pixel as X,Y
        #[arg(value_parser = parse_point)]
        pixel: Point,
    },

    /// Circle through three points
    FitCircle {
        /// Three points as X,Y
        #[arg(value_parser = parse_point, num_args = 3, required = true, allow_hyphen_values = true)]
        points: Vec<Point>,
    },

    /// Module-gap rectangles as tokens
    Gaps {
        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        gaps: GapArgs,
    },

    /// Replay clicks into a session on a state file
    Annotate {
        /// State file (updated in place unless --output is given)
        state: PathBuf,

        /// Click behaviour
        #[arg(short, long, value_enum, default_value = "probe")]
        mode: ClickMode,

        /// Shape for draw mode
        #[arg(short, long, value_enum, default_value = "rectangle")]
        shape: Shape,

        /// Click as X,Y (repeatable, in order)
        #[arg(short, long = "click", value_parser = parse_point, allow_hyphen_values = true)]
        clicks: Vec<Point>,

        /// Replace the gap grid with the --gaps-* options
        #[arg(long)]
        set_gaps: bool,

        #[command(flatten)]
        gaps: GapArgs,

        /// End the session with a cancel instead of accepting
        #[arg(long, value_enum)]
        cancel: Option<CancelMode>,

        /// Write the result here instead
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the key=value tokens of a state file
    Tokens {
        /// State file
        state: PathBuf,

        /// Print a JSON array of {key, value} objects instead
        #[arg(long)]
        json: bool,
    },

    /// Print the processing command line for a state file
    Command {
        /// State file
        state: PathBuf,

        #[command(flatten)]
        processing: ProcessingArgs,
    },

    /// Launch the processing engine and follow its progress
    Run {
        /// State file
        state: PathBuf,

        #[command(flatten)]
        processing: ProcessingArgs,

        /// Seconds between progress polls
        #[arg(long, default_value = "2")]
        poll_secs: u64,

        /// Polls without a new stage before giving up
        #[arg(long, default_value = "1800")]
        timeout_polls: u32,
    },
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init {
            image,
            output,
            tokens,
            imginfo,
        } => {
            let config = ToolConfig {
                image_info: imginfo,
                ..ToolConfig::default()
            };
            let header = read_image_header(&config, &image)?;
            let geometry = header.to_geometry();
            geometry.validate()?;
            let state = MaskState::from_tokens(geometry, &tokens)?;
            save_state(&output, &state)?;
            println!(
                "Wrote {} ({} masks, beam {:.2} {:.2})",
                output.display(),
                state.masks.len(),
                state.geometry.beam_centre_px.x,
                state.geometry.beam_centre_px.y
            );
        }

        Commands::Header { image, imginfo } => {
            let config = ToolConfig {
                image_info: imginfo,
                ..ToolConfig::default()
            };
            let header = read_image_header(&config, &image)?;
            print_geometry(&header.to_geometry());
            if let Some(osc) = header.oscillation_deg {
                println!("Oscillation:      {osc} deg");
            }
            if let Some(overload) = header.overload {
                println!("Overload:         {overload}");
            }
            for label in &header.missing {
                println!("Unavailable:      {label}");
            }
        }

        Commands::Convert {
            image,
            output,
            overload,
            slab,
            slabs,
            converter,
        } => {
            let mut request = ConversionRequest::new(image, output);
            if let Some(overload) = overload {
                request = request.with_overload(overload);
            }
            if let (Some(index), Some(count)) = (slab, slabs) {
                request = request.with_slab(Slab { index, count });
            }
            let raster = ConversionTask::spawn(converter, request).wait()?;
            println!(
                "{}: {} x {}",
                raster.path.display(),
                raster.width,
                raster.height
            );
        }

        Commands::Rings {
            geometry,
            count,
            ice,
        } => {
            let geometry = geometry.resolve()?;
            println!("{:>10} {:>10} {:>10} {:>10} {:>10}", "d (Å)", "x", "y", "rx", "ry");
            for ring in compute_rings(&geometry, count) {
                print_ring(&ring);
            }
            if ice {
                println!("Ice rings:");
                for ring in compute_ice_rings(&geometry) {
                    print_ring(&ring);
                }
            }
        }

        Commands::Probe { geometry, pixel } => {
            let geometry = geometry.resolve()?;
            let reading = geometry.probe(pixel);
            println!(
                "x={:.1} y={:.1} resolution {:.3} Å",
                reading.pixel.x, reading.pixel.y, reading.resolution_a
            );
        }

        Commands::FitCircle { points } => {
            let circle = fit_circle(points[0], points[1], points[2])?;
            println!(
                "centre {:.3} {:.3} radius {:.3}",
                circle.centre.x, circle.centre.y, circle.radius
            );
        }

        Commands::Gaps { geometry, gaps } => {
            let geometry = geometry.resolve()?;
            for gap in compute_gaps(&geometry, &gaps.config()?) {
                println!("{}", gap.to_param());
            }
        }

        Commands::Annotate {
            state,
            mode,
            shape,
            clicks,
            set_gaps,
            gaps,
            cancel,
            output,
        } => {
            let initial = load_state(&state)?;
            let gaps = set_gaps.then(|| gaps.config()).transpose()?;
            let (notices, outcome) = replay(
                initial,
                mode.into(),
                shape.into(),
                &clicks,
                gaps,
                cancel.map(|c| match c {
                    CancelMode::DiscardNew => CancelScope::DiscardNew,
                    CancelMode::RevertAll => CancelScope::RevertAll,
                }),
            );
            for notice in &notices {
                println!("{notice}");
            }
            let outcome = outcome.ok_or(CliError::SessionOpen)?;
            let path = output.unwrap_or(state);
            save_state(&path, &outcome)?;
            println!("Saved {} masks to {}", outcome.masks.len(), path.display());
        }

        Commands::Tokens { state, json } => {
            let state = load_state(&state)?;
            write_tokens(&mut std::io::stdout().lock(), &state.tokens(), json)?;
        }

        Commands::Command { state, processing } => {
            let command = assemble(&state, &processing)?;
            println!("{}", command.display_line());
        }

        Commands::Run {
            state,
            processing,
            poll_secs,
            timeout_polls,
        } => {
            let command = assemble(&state, &processing)?;
            println!("{}", command.display_line());
            let mut job = ProcessingJob::launch(&command, &processing.output_dir, timeout_polls)?;
            follow(&mut job, poll_secs)?;
        }
    }
    Ok(())
}

fn assemble(state: &Path, processing: &ProcessingArgs) -> Result<ProcessingCommand> {
    let state = load_state(state)?;
    Ok(ProcessingCommand::assemble(
        processing.program.clone(),
        &processing.parameters()?,
        &state.tokens(),
    ))
}

/// Writes tokens one per line in shell form, or as JSON.
fn write_tokens(out: &mut impl Write, tokens: &[XdsParam], json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, tokens)?;
        writeln!(out)?;
    } else {
        for token in tokens {
            writeln!(out, "{token}")?;
        }
    }
    Ok(())
}

fn follow(job: &mut ProcessingJob, poll_secs: u64) -> Result<()> {
    let interval = std::time::Duration::from_secs(poll_secs.max(1));
    loop {
        match job.poll()? {
            ProgressUpdate::Advanced(stage) => {
                eprintln!("[{:>3.0}%] {stage}", stage.fraction() * 100.0);
            }
            ProgressUpdate::Unchanged(_) => {}
            ProgressUpdate::Finished => {
                println!("Processing finished, log: {}", job.log_path().display());
                return Ok(());
            }
            ProgressUpdate::TimedOut(stage) => {
                job.kill()?;
                let stage = stage.map_or_else(|| "none".to_string(), |s| s.to_string());
                return Err(CliError::Stalled(stage));
            }
        }
        thread::sleep(interval);
    }
}

/// Runs clicks through a session and ends it; returns notices and outcome.
fn replay(
    state: MaskState,
    mode: Mode,
    shape: ShapeKind,
    clicks: &[Point],
    gaps: Option<GapGridConfig>,
    cancel: Option<CancelScope>,
) -> (Vec<Notice>, Option<MaskState>) {
    let mut notices = Vec::new();
    let mut session = AnnotationSession::new(state)
        .handle(AnnotationEvent::ModeChanged(mode))
        .handle(AnnotationEvent::ShapeKindChanged(shape));
    for &point in clicks {
        session = session.handle(AnnotationEvent::ClickAt(point));
        notices.extend(session.notice().cloned());
    }
    if let Some(gaps) = gaps {
        session = session.handle(AnnotationEvent::GapsChanged(gaps));
    }
    let end = cancel.map_or(AnnotationEvent::Accept, AnnotationEvent::Cancel);
    session = session.handle(end);
    if session.phase() == SessionPhase::Open {
        return (notices, None);
    }
    (notices, session.into_outcome())
}

fn print_geometry(geometry: &DetectorGeometry) {
    println!("Distance:         {} mm", geometry.distance_mm);
    println!("Wavelength:       {} Å", geometry.wavelength_a);
    println!(
        "Pixel size:       {} x {} mm",
        geometry.pixel_size_x_mm, geometry.pixel_size_y_mm
    );
    println!(
        "Pixels:           {} x {}",
        geometry.pixel_count_x, geometry.pixel_count_y
    );
    println!(
        "Beam centre:      {:.2} {:.2}",
        geometry.beam_centre_px.x, geometry.beam_centre_px.y
    );
    println!("2-theta:          {} deg", geometry.two_theta_deg);
}

fn print_ring(ring: &ResolutionRing) {
    let (rx, ry) = ring.shape.half_axes();
    let centre = ring.shape.centre();
    let kind = match ring.shape {
        RingShape::Circle { .. } => "",
        RingShape::Ellipse { .. } => " (ellipse)",
    };
    println!(
        "{:>10.2} {:>10.1} {:>10.1} {:>10.1} {:>10.1}{kind}",
        ring.resolution_a, centre.x, centre.y, rx, ry
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdsmask_core::{MaskOrigin, MaskRegion};

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("12.5, -3").unwrap(), Point::new(12.5, -3.0));
        assert!(parse_point("12.5").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_cli_parses_fit_circle() {
        let cli = Cli::try_parse_from([
            "xdsmask",
            "fit-circle",
            "100,100",
            "200,100",
            "150,150",
        ])
        .unwrap();
        let Commands::FitCircle { points } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_geometry_override_recentres_beam() {
        let args = GeometryArgs {
            nx: Some(1000),
            ny: Some(800),
            ..GeometryArgs::default()
        };
        let geometry = args.resolve().unwrap();
        assert_eq!(geometry.beam_centre_px, Point::new(500.0, 400.0));
    }

    #[test]
    fn test_geometry_rejects_bad_distance() {
        let args = GeometryArgs {
            distance: Some(0.0),
            ..GeometryArgs::default()
        };
        assert!(matches!(args.resolve(), Err(CliError::Core(_))));
    }

    #[test]
    fn test_replay_draw_and_accept() {
        let state = MaskState::new(DetectorGeometry::default());
        let clicks = [Point::new(10.0, 10.0), Point::new(50.0, 40.0)];
        let (notices, outcome) =
            replay(state, Mode::Draw, ShapeKind::Rectangle, &clicks, None, None);
        assert_eq!(notices.len(), 2);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.masks.len(), 1);
        assert_eq!(
            outcome.tokens()[0].to_string(),
            "autoPROC_XdsKeyword_UNTRUSTED_RECTANGLE=\"10 50 10 40\""
        );
    }

    #[test]
    fn test_replay_cancel_discard_new() {
        let mut state = MaskState::new(DetectorGeometry::default());
        state.masks.insert(
            MaskRegion::rectangle(Point::new(0.0, 0.0), Point::new(5.0, 5.0)),
            MaskOrigin::Preexisting,
        );
        let clicks = [Point::new(100.0, 100.0), Point::new(150.0, 150.0)];
        let (_, outcome) = replay(
            state,
            Mode::Draw,
            ShapeKind::Ellipse,
            &clicks,
            None,
            Some(CancelScope::DiscardNew),
        );
        assert_eq!(outcome.unwrap().masks.len(), 1);
    }

    #[test]
    fn test_annotate_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save_state(&path, &MaskState::default()).unwrap();
        run(Commands::Annotate {
            state: path.clone(),
            mode: ClickMode::Beam,
            shape: Shape::Rectangle,
            clicks: vec![
                Point::new(100.0, 100.0),
                Point::new(200.0, 100.0),
                Point::new(150.0, 150.0),
            ],
            set_gaps: false,
            gaps: GapArgs::default(),
            cancel: None,
            output: None,
        })
        .unwrap();
        let saved = load_state(&path).unwrap();
        assert_eq!(saved.tokens()[0].to_string(), "beam=\"150.00 100.00\"");
    }

    #[test]
    fn test_write_tokens_plain_and_json() {
        let tokens = vec![XdsParam::new("beam", "150.00 100.00")];
        let mut plain = Vec::new();
        write_tokens(&mut plain, &tokens, false).unwrap();
        assert_eq!(String::from_utf8(plain).unwrap(), "beam=\"150.00 100.00\"\n");

        let mut json = Vec::new();
        write_tokens(&mut json, &tokens, true).unwrap();
        let parsed: Vec<XdsParam> = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, tokens);
    }

    #[test]
    fn test_gap_args_reject_huge_counts() {
        let args = GapArgs {
            gaps_x: u32::MAX,
            ..GapArgs::default()
        };
        assert!(matches!(args.config(), Err(CliError::Core(_))));
        assert!(GapArgs::default().config().is_ok());
    }
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use region_plotter::{Color, Composer, RenderOutcome, RenderStyle, RenderTarget};

#[derive(Parser, Debug)]
#[command(name = "plot_regions")]
#[command(about = "Plot FlightGear's regional materials on a world map")]
struct Args {
    /// The input XML file or directory containing XML files
    input: PathBuf,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// The output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// JSON file with a render style; flags below override it
    #[arg(long, value_parser = load_style)]
    style: Option<RenderStyle>,

    /// The GeoJSON land shape of the world [default: world/ne_110m_land.geojson]
    #[arg(short = 's', long)]
    worldshape: Option<PathBuf>,

    /// The color of the world shape [default: silver]
    #[arg(short, long)]
    worldcolor: Option<Color>,

    /// The color of the coastline redrawn over the regions [default: dimgray]
    #[arg(long)]
    edgecolor: Option<Color>,

    /// The color of the region shape in per-file mode [default: b]
    #[arg(short, long)]
    facecolor: Option<Color>,

    /// The alpha value of the region shape [default: 0.5]
    #[arg(short, long, value_parser = parse_alpha)]
    alpha: Option<f32>,

    /// The width of the figure, in inches (DPI=100) [default: 12]
    #[arg(long)]
    width: Option<f32>,

    /// The height of the figure, in inches (DPI=100) [default: 9]
    #[arg(long)]
    height: Option<f32>,

    /// Map window as (min_lon, max_lon, min_lat, max_lat), e.g. "(-30, 45, 15, 60)"
    #[arg(long, allow_hyphen_values = true)]
    boundaries: Option<RenderTarget>,

    /// Save all files in a single PNG file
    #[arg(long)]
    single: bool,

    /// Only plot regions defining this material (with --single)
    #[arg(long)]
    material: Option<String>,

    /// Add a legend with one entry per region file (with --single)
    #[arg(long)]
    legend: bool,

    /// Seed for the region colors (random if not specified)
    #[arg(long)]
    seed: Option<u64>,

    /// Name of the manifest inside the input directory
    #[arg(long, default_value = "materials.xml")]
    manifest: String,

    /// Render per-file images in parallel
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn render_style(&self) -> RenderStyle {
        let mut style = self.style.clone().unwrap_or_default();
        if let Some(path) = &self.worldshape {
            style.world_shape = path.clone();
        }
        if let Some(c) = self.worldcolor {
            style.world_color = c;
        }
        if let Some(c) = self.edgecolor {
            style.edge_color = c;
        }
        if let Some(c) = self.facecolor {
            style.region_color = c;
        }
        if let Some(a) = self.alpha {
            style.alpha = a;
        }
        if let Some(w) = self.width {
            style.width = w;
        }
        if let Some(h) = self.height {
            style.height = h;
        }
        style
    }
}

fn load_style(path: &str) -> Result<RenderStyle, String> {
    RenderStyle::load(Path::new(path)).map_err(|e| e.to_string())
}

fn parse_alpha(s: &str) -> Result<f32, String> {
    let alpha: f32 = s.parse().map_err(|_| format!("{:?} is not a number", s))?;
    if (0.0..=1.0).contains(&alpha) {
        Ok(alpha)
    } else {
        Err(format!("alpha must be between 0 and 1, got {}", alpha))
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.input.exists() {
        error!("Input path \"{}\" does not exist", args.input.display());
        return ExitCode::from(1);
    }

    let composer = Composer::new(&args.output)
        .style(args.render_style())
        .target(args.boundaries.unwrap_or_default())
        .manifest_name(&args.manifest)
        .parallel(args.parallel);

    if !args.single && (args.material.is_some() || args.legend) {
        warn!("--material and --legend only apply together with --single");
    }

    if args.input.is_dir() {
        if args.single {
            render_composite(&composer, &args);
        } else {
            render_per_file(&composer, &args.input);
        }
    } else {
        match composer.render_single_file(&args.input) {
            Ok(RenderOutcome::Written(path)) => info!("Wrote {}", path.display()),
            Ok(RenderOutcome::Empty) => warn!("{} has no areas; nothing written", args.input.display()),
            Err(e) => error!("Cannot process {}: {}", args.input.display(), e),
        }
    }

    ExitCode::SUCCESS
}

fn render_composite(composer: &Composer, args: &Args) {
    let seed = args.seed.unwrap_or_else(|| rand::random());
    info!("Region color seed: {}", seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    match composer.render_composite(&args.input, args.material.as_deref(), args.legend, &mut rng) {
        Ok(report) => {
            info!(
                "Wrote {} ({} regions drawn, {} empty, {} skipped)",
                report.artifact.display(),
                report.drawn.len(),
                report.empty.len(),
                report.skipped.len()
            );
        }
        Err(e) => error!("Cannot process {}: {}", args.input.display(), e),
    }
}

fn render_per_file(composer: &Composer, directory: &Path) {
    match composer.render_per_file(directory) {
        Ok(report) => {
            info!(
                "Wrote {} images ({} empty, {} failed)",
                report.written.len(),
                report.empty.len(),
                report.failed.len()
            );
            if !report.is_complete() {
                warn!(
                    "{} of the region files in {} could not be rendered",
                    report.failed.len(),
                    directory.display()
                );
            }
        }
        Err(e) => error!("Cannot process {}: {}", directory.display(), e),
    }
}

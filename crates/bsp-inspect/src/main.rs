//! Builds, inspects and ray-tests collision BSP files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use collision_bsp::bsp::FirstTriangle;
use collision_bsp::{
    BspTree, BuildConfig, CollectingVisitor, LoadedBsp, SectionContainer, UserDataKey,
};
use log::{debug, info};
use nalgebra::Point3;

mod soup;

#[derive(Parser)]
#[command(name = "bsp-inspect")]
#[command(about = "Build, inspect and ray-test collision BSP files", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a tree from a text triangle soup
    Build {
        /// Soup file, one triangle per line
        input: PathBuf,

        /// Output tree file
        #[arg(short, long)]
        output: PathBuf,

        /// Largest triangle count kept in a leaf
        #[arg(long, default_value_t = 10)]
        leaf_size: usize,

        /// Split on the first triangle's plane instead of searching
        #[arg(long)]
        first_triangle: bool,
    },

    /// Print counts, bounds and user data of a tree file
    Info { file: PathBuf },

    /// Print every node, indented by depth
    Dump { file: PathBuf },

    /// Cast a segment through a tree
    Ray {
        file: PathBuf,

        #[arg(long, value_parser = soup::parse_point, allow_hyphen_values = true)]
        start: Point3<f32>,

        #[arg(long, value_parser = soup::parse_point, allow_hyphen_values = true)]
        end: Point3<f32>,

        /// Report every hit instead of the closest
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{}", full_error_display(err));
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new().build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .context("Error initialising logger")?;

    match cli.command {
        Commands::Build {
            input,
            output,
            leaf_size,
            first_triangle,
        } => build(&input, &output, leaf_size, first_triangle),
        Commands::Info { file } => info_command(&file),
        Commands::Dump { file } => {
            let tree = open(&file)?.tree;
            print!("{}", tree.dump());
            Ok(())
        }
        Commands::Ray {
            file,
            start,
            end,
            all,
        } => ray(&file, start, end, all),
    }
}

fn build(input: &Path, output: &Path, leaf_size: usize, first_triangle: bool) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Error reading {}", input.display()))?;
    let triangles = soup::parse(&text).with_context(|| format!("Error parsing {}", input.display()))?;
    if triangles.is_empty() {
        bail!("{} holds no usable triangles", input.display());
    }
    info!("building from {} triangles", triangles.len());

    let config = BuildConfig::default().with_max_leaf_size(leaf_size);
    let mut tree = if first_triangle {
        BspTree::build_with(triangles, &config, &FirstTriangle)
    } else {
        BspTree::build(triangles, &config)
    }
    .context("Error building tree")?;

    let stamp = chrono::Utc::now().timestamp().to_string();
    tree.set_user_data(UserDataKey::TIME_STAMP, stamp.into_bytes());

    tree.save(output)
        .with_context(|| format!("Error writing {}", output.display()))?;
    info!("wrote {}: {}", output.display(), tree.stats());
    Ok(())
}

/// Reads a tree file, bare or wrapped in a section container.
fn open(path: &Path) -> Result<LoadedBsp> {
    let data = fs::read(path).with_context(|| format!("Error reading {}", path.display()))?;
    let loaded = if SectionContainer::is_container(&data) {
        let container = SectionContainer::parse(&data)
            .with_context(|| format!("Error reading sections of {}", path.display()))?;
        debug!("sections: {:?}", container.names().collect::<Vec<_>>());
        BspTree::load_sections(&container)
    } else {
        BspTree::from_bytes(&data).map(|tree| LoadedBsp {
            tree,
            material_ids: None,
            requires_remap: false,
        })
    };
    loaded.with_context(|| format!("Error loading tree from {}", path.display()))
}

fn info_command(path: &Path) -> Result<()> {
    let loaded = open(path)?;
    let tree = &loaded.tree;

    println!("{}", path.display());
    println!("  {}", tree.stats());
    if tree.bb().is_empty() {
        println!("  bounds: empty");
    } else {
        let bb = tree.bb();
        println!(
            "  bounds: ({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
            bb.min.x, bb.min.y, bb.min.z, bb.max.x, bb.max.y, bb.max.z
        );
    }
    println!("  can collide: {}", tree.can_collide());
    println!("  flags need remap: {}", loaded.requires_remap);
    if let Some(ids) = &loaded.material_ids {
        println!("  material ids: {}", ids.len());
        for (i, id) in ids.iter().enumerate() {
            println!("    {i}: {id}");
        }
    }

    for key in tree.user_data_keys() {
        let data = tree.user_data(key).unwrap_or_default();
        if key == UserDataKey::TIME_STAMP {
            println!("  {key}: {} bytes ({})", data.len(), describe_stamp(data));
        } else {
            println!("  {key}: {} bytes", data.len());
        }
    }
    Ok(())
}

fn describe_stamp(data: &[u8]) -> String {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| "unreadable".to_string())
}

fn ray(path: &Path, start: Point3<f32>, end: Point3<f32>, all: bool) -> Result<()> {
    let tree = open(path)?.tree;
    let length = (end - start).norm();

    if all {
        let mut visitor = CollectingVisitor::new();
        tree.visit_ray(start, end, 1.0, &mut visitor);
        if visitor.hits().is_empty() {
            println!("no hit");
        }
        for hit in visitor.hits() {
            print_hit(start, end, length, &hit.triangle, hit.distance);
        }
    } else {
        match tree.intersects_ray(start, end, 1.0) {
            Some(hit) => print_hit(start, end, length, hit.triangle, hit.distance),
            None => println!("no hit"),
        }
    }
    Ok(())
}

fn print_hit(
    start: Point3<f32>,
    end: Point3<f32>,
    length: f32,
    triangle: &collision_bsp::WorldTriangle,
    distance: f32,
) {
    let at = start + (end - start) * distance;
    println!(
        "hit at {:.4} ({:.3} units): ({:.3}, {:.3}, {:.3}) {:?}",
        distance,
        distance * length,
        at.x,
        at.y,
        at.z,
        triangle.flags()
    );
}

/// Formats an error with its chain of causes.
fn full_error_display(err: anyhow::Error) -> String {
    let cont = err
        .chain()
        .skip(1)
        .map(|cause| format!("    caused by: {}", cause))
        .collect::<Vec<String>>()
        .join("\n");

    format!("Error: {}\n{}", err, cont)
}

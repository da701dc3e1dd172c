//! datecourse CLI
//!
//! Usage:
//!   datecourse generate [--profile <p>] [--input <places.json>] [--export <file>] [--dry-run]
//!   datecourse classify <address> [--region-code <n>] [--subregion-code <n>]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use datecourse::{
    Category, CourseConfig, CourseError, CourseGenerator, CourseStore, FailurePolicy,
    GenerationReport, LocationRecord, MemoryStore, Profile, SupabaseStore, classify, export,
    logging, region,
};

#[derive(Parser)]
#[command(name = "datecourse")]
#[command(
    version,
    about = "Generate distance-bounded date courses from geotagged places",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to <config dir>/datecourse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the stored courses with newly generated ones
    Generate {
        /// Generation profile
        #[arg(short, long, value_enum)]
        profile: Option<Profile>,

        /// Maximum distance between consecutive stops in km
        #[arg(long)]
        max_hop_km: Option<f64>,

        /// Minimum stops per course
        #[arg(long)]
        min_stops: Option<usize>,

        /// Maximum stops per course
        #[arg(long)]
        max_stops: Option<usize>,

        /// What to do with a route's places when saving its course fails
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,

        /// Read places from a JSON file instead of the remote store
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Also write the generated courses to this JSON file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Plan courses without writing to the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the region key an address would be grouped under
    Classify {
        /// Free-text address
        address: String,

        /// Area code of the place
        #[arg(long)]
        region_code: Option<i64>,

        /// Sigungu code of the place
        #[arg(long)]
        subregion_code: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<CourseError>() {
                Some(course_error) => eprintln!("Error: {}", course_error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CourseConfig::load_from_path(cli.config.clone())
        .with_context(|| "Failed to load configuration")?;

    match cli.command {
        Commands::Generate {
            profile,
            max_hop_km,
            min_stops,
            max_stops,
            on_failure,
            input,
            export: export_path,
            dry_run,
        } => {
            let generation = &mut config.generation;
            if let Some(profile) = profile {
                generation.profile = profile;
            }
            generation.max_hop_km = max_hop_km.or(generation.max_hop_km);
            generation.min_stops_per_course = min_stops.or(generation.min_stops_per_course);
            generation.max_stops_per_course = max_stops.or(generation.max_stops_per_course);
            if let Some(policy) = on_failure {
                generation.failure_policy = policy;
            }
            config.validate()?;

            logging::init(&config.logging, cli.verbose);

            let store: Box<dyn CourseStore> = match &input {
                Some(path) => Box::new(MemoryStore::from_json_file(path)?),
                None => {
                    config.validate_store_credentials()?;
                    Box::new(SupabaseStore::new(&config.store)?)
                }
            };

            let generator = CourseGenerator::new(config.generation.settings());
            info!(
                "Profile {:?}: filter {}, {} routes, hop <= {} km, {}-{} stops",
                config.generation.profile,
                generator.settings().filter_policy,
                generator.settings().route.mode,
                generator.settings().route.max_hop_km,
                generator.settings().route.min_stops,
                generator.settings().route.max_stops
            );

            let outcome = if dry_run {
                let records = generator.fetch(store.as_ref()).await?;
                generator.plan(records)
            } else {
                generator.run(store.as_ref()).await?
            };

            if let Some(path) = &export_path {
                export::write_courses(path, &outcome.courses)
                    .with_context(|| format!("Failed to export courses to {}", path.display()))?;
            }

            print_report(&outcome.report, dry_run);
        }
        Commands::Classify {
            address,
            region_code,
            subregion_code,
        } => {
            logging::init(&config.logging, cli.verbose);

            let record = LocationRecord::new("cli", 0.0, 0.0, Category::default())
                .with_codes(region_code, subregion_code)
                .with_address(address.as_str());
            let key = classify(&record);

            println!("Region:    {}", key.region_name);
            match &key.subregion {
                Some(subregion) => println!("Subregion: {subregion}"),
                None => println!("Subregion: (ungrouped)"),
            }
            if let Some(name) = region::parse_subregion_name(Some(address.as_str())) {
                println!("Parsed:    {name}");
            }
        }
    }

    Ok(())
}

fn print_report(report: &GenerationReport, dry_run: bool) {
    println!("\n{}", "=".repeat(60));
    if dry_run {
        println!("Dry run, nothing was written");
    }
    println!("Places fetched:   {}", report.places_fetched);
    println!("Candidates:       {}", report.candidates);
    println!(
        "Clusters:         {} ({} too small)",
        report.clusters, report.clusters_skipped
    );
    println!("Courses created:  {}", report.courses_created);

    if !report.per_region.is_empty() {
        println!("\nBy region:");
        for (name, count) in &report.per_region {
            println!("  {name:<6} {count}");
        }
    }

    if !report.courses_failed.is_empty() {
        println!("\nFailed courses:");
        for title in &report.courses_failed {
            println!("  - {title}");
        }
    }
    println!("{}", "=".repeat(60));
}

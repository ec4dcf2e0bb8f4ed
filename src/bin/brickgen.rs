//! brickgen CLI - bindings, examples and docs from YAML device configurations
//!
//! This CLI tool renders every selected language for every device found in a
//! config directory.

use std::path::{Path, PathBuf};
use std::process;

use brickgen::codegen::orchestration::FileStatus;
use brickgen::codegen::{
    generate_all_from_config, load_devices, Action, GenerationConfig, GenerationOptions, GenerationSummary,
    GeneratorCallbacks, Language,
};
use brickgen::layout::PacketLayout;
use brickgen::model::Device;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brickgen")]
#[command(version, about = "Bindings and documentation generator for YAML device configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings, examples and docs
    Generate {
        /// Directory containing one YAML file per device
        #[arg(short, long, default_value = "config/devices")]
        config: PathBuf,

        /// Output directory for generated files
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Languages to generate (all when omitted)
        #[arg(short, long = "lang", value_enum)]
        languages: Vec<Language>,

        /// Actions to run (bindings and doc when omitted)
        #[arg(short, long = "action", value_enum)]
        actions: Vec<Action>,

        /// Date stamped into file headers, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,

        /// Fail if any generated file differs from the output directory
        #[arg(long)]
        check: bool,
    },

    /// Validate YAML configurations without generating code
    Validate {
        /// Directory containing one YAML file per device
        #[arg(short, long, default_value = "config/devices")]
        config: PathBuf,
    },

    /// Print request and response sizes of every packet
    Layout {
        /// Directory containing one YAML file per device
        #[arg(short, long, default_value = "config/devices")]
        config: PathBuf,

        /// Only show devices matching this name
        #[arg(short, long)]
        device: Option<String>,
    },

    /// List available languages
    Languages,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            config,
            output,
            languages,
            actions,
            date,
            check,
        } => generate(config, output, languages, actions, date, check),
        Commands::Validate { config } => validate(&config),
        Commands::Layout { config, device } => layout(&config, device.as_deref()),
        Commands::Languages => {
            list_languages();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Prints one line per device as the pipeline progresses
struct Progress {
    check: bool,
}

impl GeneratorCallbacks for Progress {
    fn after_file(&self, _language: Language, _action: Action, path: &Path, status: FileStatus) {
        if status == FileStatus::Stale {
            println!("  ✗ {} is out of date", path.display());
        }
    }

    fn after_device(&self, device: &Device, files: usize) {
        let verb = if self.check { "Checked" } else { "Generated" };
        println!("  ✓ {} {} ({} files)", verb, device.full_name().space(), files);
    }

    fn finalize(&self, summary: &GenerationSummary) {
        println!(
            "  ℹ {} written, {} unchanged, {} stale",
            summary.written.len(),
            summary.unchanged.len(),
            summary.stale.len()
        );
    }
}

fn parse_date(date: Option<String>) -> Result<Option<NaiveDate>, String> {
    date.map(|d| {
        NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| format!("Invalid date '{}': {}", d, e))
    })
    .transpose()
}

fn generate(
    config: PathBuf,
    output: PathBuf,
    languages: Vec<Language>,
    actions: Vec<Action>,
    date: Option<String>,
    check: bool,
) -> Result<(), String> {
    println!("🔧 Generating from {}...", config.display());

    let mut generation = GenerationConfig::new(&config, &output).with_env();
    generation.languages = languages;
    generation.actions = actions;
    generation.options = GenerationOptions {
        date: parse_date(date)?,
    };
    generation.check = check;

    if let Some(filter) = &generation.example_filter {
        println!("  ℹ Examples restricted to devices matching '{}'", filter);
    }

    let progress = Progress { check };
    let summary = generate_all_from_config(&generation, Some(&progress)).map_err(|e| e.to_string())?;

    if check {
        println!("✨ All {} files are up to date!", summary.total());
    } else {
        println!("✨ Generation complete! Output in {}", output.display());
    }
    Ok(())
}

fn validate(config: &Path) -> Result<(), String> {
    println!("🔍 Validating {}...", config.display());

    let devices = load_devices(config).map_err(|e| e.to_string())?;
    for device in &devices {
        println!(
            "  ✓ {} ({} packets, {} constant groups, {} examples)",
            device.full_name().space(),
            device.packets.len(),
            device.constant_groups.len(),
            device.examples.len()
        );
    }

    println!("✨ {} device(s) valid!", devices.len());
    Ok(())
}

fn layout(config: &Path, filter: Option<&str>) -> Result<(), String> {
    let devices = load_devices(config).map_err(|e| e.to_string())?;

    let mut shown = 0;
    for device in devices.iter().filter(|d| filter.map_or(true, |f| d.matches(f))) {
        println!("{} (identifier {})", device.full_name().space(), device.device_identifier);
        for packet in &device.packets {
            let layout = PacketLayout::of(packet);
            println!(
                "  {:>3}  {:<40} request {:>2} bytes  response {:>2} bytes",
                packet.function_id,
                packet.name.space(),
                layout.request_length(),
                layout.response_length()
            );
        }
        shown += 1;
    }

    if shown == 0 {
        return Err(match filter {
            Some(f) => format!("No device matches '{}'", f),
            None => format!("No devices found in {}", config.display()),
        });
    }
    Ok(())
}

fn list_languages() {
    for language in Language::ALL {
        println!("  {:<8} {}", language.key(), language.display_name());
    }
}

// Intvboot CLI
// Brings a machine configuration up and reports the resulting bus and bindings

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use intvboot_core::mapping::MapIndex;
use intvboot_core::{ActionRegistry, Session, Settings, StockFactory};

/// Intellivision machine bring-up
#[derive(Parser, Debug)]
#[command(name = "intvboot")]
#[command(version)]
#[command(about = "Assemble an Intellivision machine from a settings file", long_about = None)]
struct Args {
    /// TOML settings file (default: ~/.config/intvboot/settings.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Keyboard binding file overlaid on the default bindings
    #[arg(short, long, value_name = "FILE")]
    kbdhackfile: Option<PathBuf>,

    /// Enable the ECS expansion
    #[arg(long)]
    ecs: bool,

    /// Enable the Intellivoice
    #[arg(long)]
    voice: bool,

    /// Attach the debug monitor
    #[arg(long)]
    debugger: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate settings and bindings, then exit
    #[arg(long)]
    check_config: bool,

    /// Print the memory map and binding table
    #[arg(long)]
    map: bool,
}

impl Args {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => Settings::load_default().context("failed to load default settings")?,
        };

        settings.ecs |= self.ecs;
        settings.voice |= self.voice;
        settings.debugger |= self.debugger;
        if let Some(path) = &self.kbdhackfile {
            settings.kbdhackfile = Some(path.clone());
        }
        Ok(settings)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn print_map(session: &Session) {
    println!("Memory map:");
    for descriptor in session.bus().descriptors() {
        println!("  {}", descriptor);
    }

    let registry = ActionRegistry::builtin();
    let bindings = session.bindings();
    for map in MapIndex::all() {
        println!("Map {} ({} bindings):", map, bindings.len_in_map(map));
        for (key, binding) in bindings.iter_map(map) {
            let action = registry
                .get(binding.action)
                .map_or("?", |a| a.name.as_str());
            println!("  {:<12} {}", key, action);
        }
    }

    let combos = bindings.combos();
    if !combos.is_empty() {
        println!("Combos (window {:.1}ms):", combos.window_secs() * 1000.0);
        for combo in combos.iter() {
            println!("  {}", combo);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = args.settings()?;
    log::debug!("Settings: {:?}", settings);
    let session = Session::start(settings, &mut StockFactory::new())
        .context("machine bring-up failed")?;

    if args.map {
        print_map(&session);
    }

    if args.check_config {
        println!("Configuration is valid");
    }

    session.shutdown();
    Ok(())
}

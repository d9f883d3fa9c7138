//! Command-line front end for exporting and importing modpack packages

mod layout;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use layout::Layout;
use packager::export::settings::ExportPolicy;
use packager::package::StrategyKind;
use packager::{
    ConsoleProgressReporter, ExportConfigBuilder, ExportSettings, Exporter, Importer,
    IntoProgressCallback, LocalModStore, ModRepository, OfflineRepository, Package, PortalClient,
    Reconciler, ZipModFileLoader, prepare_export,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "packager-cli", version, about = "Export and import Factorio modpack packages")]
struct Cli {
    /// Show debug output and per-mod progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write modpacks from a mods directory into a .fmp or .fmpa file
    Export {
        mods_dir: PathBuf,
        destination: PathBuf,
        /// Modpacks to export (default: all)
        #[arg(long = "modpack", value_name = "NAME")]
        modpacks: Vec<String>,
        /// Bundle the mod files, producing a .fmpa archive
        #[arg(long)]
        include: bool,
        /// How the importing side picks mod versions
        #[arg(long, value_enum, default_value_t = Mode::Latest)]
        mode: Mode,
        /// Prefer a newer release over a bundled file on import
        #[arg(long)]
        download_newer: bool,
        /// Deflate level for bundled files
        #[arg(long, default_value_t = 1)]
        compression: i64,
    },
    /// Install a package into a mods directory
    Import {
        source: PathBuf,
        mods_dir: PathBuf,
        /// Never contact the mod portal
        #[arg(long)]
        offline: bool,
    },
    /// Print the contents of a package
    Inspect { source: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Latest,
    Specific,
    Factorio,
}

impl From<Mode> for StrategyKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Latest => StrategyKind::Latest,
            Mode::Specific => StrategyKind::Specific,
            Mode::Factorio => StrategyKind::FactorioCompatible,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match cli.command {
        Command::Export {
            mods_dir,
            destination,
            modpacks,
            include,
            mode,
            download_newer,
            compression,
        } => {
            let policy = ExportPolicy::new(mode.into())
                .included(include)
                .download_newer(download_newer);
            export(&mods_dir, &destination, &modpacks, policy, compression, cli.verbose)
        }
        Command::Import {
            source,
            mods_dir,
            offline,
        } => import(&source, &mods_dir, offline, cli.verbose).await,
        Command::Inspect { source } => inspect(&source),
    }
}

fn load_store(mods_dir: &Path) -> Result<LocalModStore> {
    let mut store = LocalModStore::scan(mods_dir, &ZipModFileLoader)
        .with_context(|| format!("scanning {}", mods_dir.display()))?;
    Layout::load(mods_dir)?.apply(&mut store)?;
    info!(
        "Loaded {} mods and {} modpacks from {}",
        store.mods().len(),
        store.modpacks().len(),
        mods_dir.display()
    );
    Ok(store)
}

fn export(
    mods_dir: &Path,
    destination: &Path,
    names: &[String],
    policy: ExportPolicy,
    compression: i64,
    verbose: bool,
) -> Result<()> {
    let store = load_store(mods_dir)?;

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match store.modpack_by_name(name) {
            Some(modpack) => selected.push(modpack.uid),
            None => bail!("no modpack named '{}' in {}", name, mods_dir.display()),
        }
    }
    if store.modpacks().is_empty() {
        bail!("{} defines no modpacks", layout::layout_path(mods_dir).display());
    }

    let prepared = prepare_export(store.modpacks(), &selected, &ExportSettings::new(policy))?;
    let config = ExportConfigBuilder::new().compression_level(compression).build();
    let exporter = Exporter::new(config).with_progress(ConsoleProgressReporter::new(verbose).into_callback());
    let exported = exporter.export(
        &prepared.package,
        policy.included,
        &prepared.files,
        destination,
    )?;

    println!(
        "Exported {} modpacks and {} mods ({} bundled) to {}",
        prepared.package.modpacks().len(),
        prepared.package.mods().len(),
        prepared.files.len(),
        exported.path.display()
    );
    Ok(())
}

async fn import(source: &Path, mods_dir: &Path, offline: bool, verbose: bool) -> Result<()> {
    let mut store = load_store(mods_dir)?;
    let repository: Arc<dyn ModRepository> = if offline {
        Arc::new(OfflineRepository)
    } else {
        Arc::new(PortalClient::from_env()?)
    };

    let import = Importer::new()
        .import_to_temp(source)
        .with_context(|| format!("reading {}", source.display()))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, skipping remaining downloads");
            on_interrupt.cancel();
        }
    });

    let reconciler = Reconciler::new(repository, Arc::new(ZipModFileLoader))
        .with_cancellation(cancel)
        .with_progress(ConsoleProgressReporter::new(verbose).into_callback());
    let outcome = reconciler.reconcile(import, &mut store).await;

    Layout::from_store(&store).save(mods_dir)?;

    println!(
        "Imported {} mods and {} modpacks",
        outcome.mods.len(),
        outcome.modpacks.len()
    );
    if !outcome.is_complete() {
        println!("{} mods could not be installed:", outcome.unresolved.len());
        for unresolved in &outcome.unresolved {
            println!("  {}: {}", unresolved.name, unresolved.reason);
        }
    }
    Ok(())
}

fn inspect(source: &Path) -> Result<()> {
    let import = Importer::new()
        .import_to_temp(source)
        .with_context(|| format!("reading {}", source.display()))?;
    print_package(&import.package);

    if !import.files.is_empty() {
        println!("Bundled files:");
        for file in import.files.iter() {
            println!("  {}", file.stored_name);
        }
    }
    Ok(())
}

fn print_package(package: &Package) {
    println!("Format version {}", package.format_version());
    println!("Mods:");
    for definition in package.mods() {
        let mode = definition.mode();
        let strategy = match definition.version().or(definition.factorio_version()) {
            Some(version) => format!("{:?} {}", mode.strategy.kind(), version),
            None => format!("{:?}", mode.strategy.kind()),
        };
        let mut flags = Vec::new();
        if mode.included {
            flags.push("bundled");
        }
        if mode.download_newer {
            flags.push("download newer");
        }
        println!(
            "  [{}] {} ({}{}{})",
            definition.uid(),
            definition.name(),
            strategy,
            if flags.is_empty() { "" } else { ", " },
            flags.join(", ")
        );
    }

    println!("Modpacks:");
    for modpack in package.modpacks() {
        let mods: Vec<&str> = modpack
            .mod_ids
            .iter()
            .filter_map(|uid| package.mod_definition(*uid).map(|definition| definition.name()))
            .collect();
        let children: Vec<&str> = modpack
            .modpack_ids
            .iter()
            .filter_map(|uid| package.modpack_definition(*uid).map(|definition| definition.name.as_str()))
            .collect();
        println!("  [{}] {}", modpack.uid, modpack.name);
        if !mods.is_empty() {
            println!("      mods: {}", mods.join(", "));
        }
        if !children.is_empty() {
            println!("      modpacks: {}", children.join(", "));
        }
    }
}

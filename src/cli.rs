use anyhow::{Context, Result};
use clap::Parser;
use glob_match::glob_match;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cancel::CancelToken;
use crate::catalog::ReleaseCatalog;
use crate::compose::Composer;
use crate::config::Config;
use crate::deps::{all_dependencies, check_dependencies, dependencies_for};
use crate::descriptor;
use crate::download::github::GitHubTransport;
use crate::install::{Installer, Outcome};
use crate::mapping::{ControlMapping, LOGICAL_BUTTONS};
use crate::matcher::select_asset;
use crate::models::{Args, Commands, InstalledRuntime, OutputFormat, ReleaseRecord};
use crate::scaffold::{TitleLayout, check_executable_path};
use crate::toggles::{RawSelections, RunnerSelection, ToggleSet};

/// Main CLI entry point
pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(root) = args.install_root {
        config.install_root = root;
    }
    debug!("Install root: {}", config.install_root.display());

    let cancel = cancel_on_interrupt();

    match args.command {
        Commands::Releases { source, count } => show_releases(&config, &source, count, &cancel),
        Commands::Install {
            source,
            tags,
            count,
            arch,
            variant,
        } => install(
            &config,
            &source,
            &tags,
            count,
            arch.as_deref(),
            variant.as_deref(),
            &cancel,
        ),
        Commands::List { pattern } => list(&config, pattern.as_deref(), &cancel),
        Commands::Remove { pattern } => remove(&config, &pattern, &cancel),
        Commands::Compose {
            title_dir,
            executable,
            selections,
            format,
            controls,
        } => compose(
            &config,
            &title_dir,
            &executable,
            &selections,
            format,
            controls.as_deref(),
            &cancel,
        ),
        Commands::Controls { file, check } => controls(&file, check),
        Commands::Doctor => doctor(&config),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("WINEPORT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Token cancelled by the first Ctrl-C; a second one exits at once
fn cancel_on_interrupt() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();

    let handler = ctrlc::set_handler(move || {
        if interrupt(&token) {
            std::process::exit(130);
        }
        warn!("Interrupted, stopping after the current step (Ctrl-C again to abort)");
    });
    if let Err(e) = handler {
        warn!("Failed to install Ctrl-C handler: {e}");
    }

    cancel
}

/// Cancel `token`, true if it already was
fn interrupt(token: &CancelToken) -> bool {
    let repeated = token.is_cancelled();
    token.cancel();
    repeated
}

fn catalog(config: &Config, cancel: &CancelToken) -> ReleaseCatalog<GitHubTransport> {
    ReleaseCatalog::new(GitHubTransport::new(
        &config.api_base,
        config.retry_policy(),
        cancel.clone(),
    ))
}

fn show_releases(config: &Config, source: &str, count: usize, cancel: &CancelToken) -> Result<()> {
    let source = config.resolve_source(source)?;
    let criteria = source.criteria();
    let catalog = catalog(config, cancel);

    println!("Releases of {} ({}):", source.repo, source.label);
    let mut shown = 0;
    for release in catalog
        .list_releases(&source.repo, config.page_size.min(count.max(1)))
        .take(count)
    {
        let release = release?;
        match select_asset(&release, &criteria) {
            Some(asset) => println!("  {:<24} {}", release.tag, asset.name),
            None => println!("  {:<24} (no matching asset)", release.tag),
        }
        shown += 1;
    }

    if shown == 0 {
        println!("  (no releases)");
    }
    Ok(())
}

fn install(
    config: &Config,
    source: &str,
    tags: &[String],
    count: usize,
    arch: Option<&str>,
    variant: Option<&str>,
    cancel: &CancelToken,
) -> Result<()> {
    let mut source = config.resolve_source(source)?;
    if let Some(arch) = arch {
        source.arch = arch.to_string();
    }
    if let Some(variant) = variant {
        source.variant = Some(variant.to_string());
    }

    let catalog = catalog(config, cancel);
    let mut releases: Vec<ReleaseRecord> = Vec::new();
    // (what could not be looked up, why)
    let mut lookup_failures: Vec<(String, String)> = Vec::new();

    if tags.is_empty() {
        for release in catalog.list_releases(&source.repo, config.page_size).take(count) {
            match release {
                Ok(release) => releases.push(release),
                Err(e) => {
                    lookup_failures.push((source.repo.clone(), e.to_string()));
                    break;
                }
            }
        }
    } else {
        for (tag, result) in catalog.find_releases(&source.repo, tags, config.page_size) {
            match result {
                Ok(Some(release)) => releases.push(release),
                Ok(None) => lookup_failures.push((
                    tag,
                    format!("no release with this tag in {}", source.repo),
                )),
                Err(e) => lookup_failures.push((tag, e.to_string())),
            }
        }
    }

    let installer = Installer::from_config(config, cancel.clone());
    let report = installer.install_batch(&releases, &source.criteria(), &source.label);

    for item in &report.items {
        match &item.outcome {
            Outcome::Installed(runtime) => println!(
                "  installed  {:<20} {}",
                runtime.identity,
                runtime.root.display()
            ),
            Outcome::Skipped => println!("  skipped    {:<20} no matching asset", item.tag),
            Outcome::Failed(e) => println!("  failed     {:<20} {}", item.tag, e),
        }
    }
    for (what, reason) in &lookup_failures {
        println!("  failed     {what:<20} {reason}");
    }

    let failed = report.failed() + lookup_failures.len();
    println!(
        "{} installed, {} skipped, {} failed",
        report.installed(),
        report.skipped(),
        failed
    );

    if failed > 0 {
        anyhow::bail!("Some releases could not be installed");
    }
    Ok(())
}

fn matching_runtimes(
    installer: &Installer,
    pattern: Option<&str>,
) -> Result<Vec<InstalledRuntime>> {
    let installed = installer.list_installed()?;
    Ok(installed
        .into_iter()
        .filter(|r| pattern.is_none_or(|p| glob_match(p, &r.identity.to_string())))
        .collect())
}

fn list(config: &Config, pattern: Option<&str>, cancel: &CancelToken) -> Result<()> {
    let installer = Installer::from_config(config, cancel.clone());
    let runtimes = matching_runtimes(&installer, pattern)?;

    if runtimes.is_empty() {
        println!("No runtimes installed in {}", installer.install_root().display());
    }
    for runtime in runtimes {
        println!("{:<24} {}", runtime.identity, runtime.root.display());
    }
    Ok(())
}

fn remove(config: &Config, pattern: &str, cancel: &CancelToken) -> Result<()> {
    let installer = Installer::from_config(config, cancel.clone());
    let runtimes = matching_runtimes(&installer, Some(pattern))?;

    if runtimes.is_empty() {
        anyhow::bail!("No installed runtime matches '{pattern}'");
    }
    for runtime in runtimes {
        installer.remove(&runtime.identity)?;
        println!("Removed {}", runtime.identity);
    }
    Ok(())
}

fn compose(
    config: &Config,
    title_dir: &Path,
    executable: &Path,
    selections: &[String],
    format: OutputFormat,
    controls: Option<&Path>,
    cancel: &CancelToken,
) -> Result<()> {
    let installer = Installer::from_config(config, cancel.clone());
    let known: Vec<_> = installer
        .list_installed()?
        .into_iter()
        .map(|r| r.identity)
        .collect();

    let raw = RawSelections::parse(selections)?;
    let toggles = ToggleSet::validate(&raw, &known)?;
    check_executable_path(executable)?;

    let runtime = match &toggles.runner {
        RunnerSelection::Installed(identity) => installer.find_installed(identity),
        RunnerSelection::Default => None,
    };
    let composer = Composer::from_config(config);
    composer.check_runner(runtime.as_ref(), &toggles.runner)?;

    let mapping = controls.map(ControlMapping::read).transpose()?;

    // Nothing is written to the title directory before this point
    let layout = TitleLayout::scaffold(title_dir)?;
    let controls = title_controls(&layout, mapping.as_ref())?;
    let target = layout.target(executable, controls)?;
    let descriptor = composer.compose(runtime.as_ref(), &toggles, &target)?;

    let deps = dependencies_for(&composer, &toggles, target.controls.is_some());
    if let Err(e) = check_dependencies(&deps) {
        warn!("{e}; the launch file will not run until it is installed");
    }

    let contents =
        descriptor::render(&descriptor, format).context("Failed to serialize launch descriptor")?;
    let path = layout.write_launch_file(format, &contents)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Controller mapping used by a title: an explicitly given mapping is
/// written into the title, otherwise an existing one is picked up
fn title_controls(layout: &TitleLayout, mapping: Option<&ControlMapping>) -> Result<Option<PathBuf>> {
    let dest = layout.controls_file();

    if let Some(mapping) = mapping {
        mapping.write(&dest)?;
        return Ok(Some(dest));
    }

    if dest.exists() {
        ControlMapping::read(&dest)?;
        return Ok(Some(dest));
    }

    Ok(None)
}

fn controls(file: &Path, check: bool) -> Result<()> {
    if check {
        let mapping = ControlMapping::read(file)?;
        println!(
            "{}: valid, {} of {} buttons mapped",
            file.display(),
            mapping.mapped_count(),
            LOGICAL_BUTTONS.len()
        );
        return Ok(());
    }

    if file.exists() {
        anyhow::bail!(
            "{} already exists (use --check to validate it)",
            file.display()
        );
    }
    ControlMapping::template().write(file)?;
    println!("Wrote controller mapping template to {}", file.display());
    Ok(())
}

fn doctor(config: &Config) -> Result<()> {
    let composer = Composer::from_config(config);
    let deps = all_dependencies(&composer);

    for dep in &deps {
        match dep.locate() {
            Some(path) => println!("  ok       {:<12} {} ({})", dep.purpose, dep.program, path.display()),
            None => println!("  missing  {:<12} {}", dep.purpose, dep.program),
        }
    }
    println!("Install root: {}", config.install_root.display());

    check_dependencies(&deps)?;
    Ok(())
}

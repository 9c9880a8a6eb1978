//! Subcommand implementations.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use kiln_cli::flat;
use kiln_cli::progress::BarProgress;
use kiln_core::{CookOptions, CookOutcome, PackageOutcome, Project};
use kiln_path::{CONFIG_DIR, ProjectPath, ProjectRootPath, find_project_root};
use kiln_spec::{ScopedPool, SpecRegistry, WorkerPool};
use tracing::info;

use crate::cli::{
    AddArgs, CleanArgs, Cli, CookArgs, GroupCommand, PackageArgs, RemoveArgs, SpecCommand,
};

/// Exit code for operator-initiated cancellation.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Register built-in backends and install the process-wide registry.
pub fn install_registry() -> Arc<SpecRegistry> {
    let mut registry = SpecRegistry::new();
    flat::register(&mut registry);
    SpecRegistry::install_global(Arc::new(registry))
}

pub fn run_init(cli: &Cli) -> anyhow::Result<()> {
    let root = match &cli.project {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };
    let project = Project::open(ProjectRootPath::new(&root), install_registry())?;
    println!("initialized kiln project at {}", project.root());
    Ok(())
}

/// Locate and open the enclosing project.
fn open_project(cli: &Cli) -> anyhow::Result<Project> {
    let root = match &cli.project {
        Some(dir) => ProjectRootPath::new(dir.clone()),
        None => {
            let cwd = env::current_dir()?;
            find_project_root(&cwd).with_context(|| {
                format!("no {CONFIG_DIR} directory found above {}", cwd.display())
            })?
        }
    };
    Ok(Project::open(root, install_registry())?)
}

fn parse_paths(raw: &[String]) -> anyhow::Result<Vec<ProjectPath>> {
    raw.iter()
        .map(|p| ProjectPath::new(p).map_err(Into::into))
        .collect()
}

/// Arm the Ctrl-C handler so a cancel lands between objects, not mid-file.
fn install_interrupt_handler() {
    let _ = ctrlc::set_handler(kiln_core::request_interrupt);
}

pub fn run_add(cli: &Cli, args: &AddArgs) -> anyhow::Result<()> {
    let project = open_project(cli)?;
    let paths = parse_paths(&args.paths)?;
    project.add_paths(&paths)?;
    println!("tracking {} path(s)", paths.len());
    Ok(())
}

pub fn run_remove(cli: &Cli, args: &RemoveArgs) -> anyhow::Result<()> {
    let project = open_project(cli)?;
    let paths = parse_paths(&args.paths)?;
    project.remove_paths(&paths, args.recursive)?;
    println!("removed {} path(s)", paths.len());
    Ok(())
}

pub fn run_group(cli: &Cli, command: &GroupCommand) -> anyhow::Result<()> {
    let project = open_project(cli)?;
    match command {
        GroupCommand::Add { path } => {
            project.add_group(&ProjectPath::new(path)?)?;
            println!("registered dependency group {path}");
        }
        GroupCommand::Remove { path } => {
            project.remove_group(&ProjectPath::new(path)?)?;
            println!("unregistered dependency group {path}");
        }
        GroupCommand::List => {
            for group in project.groups()? {
                println!("{group}");
            }
        }
    }
    Ok(())
}

pub fn run_spec(cli: &Cli, command: &SpecCommand) -> anyhow::Result<()> {
    let mut project = open_project(cli)?;
    match command {
        SpecCommand::List => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_header(["name", "enabled", "passes", "description"]);
            for pds in project.data_specs() {
                table.add_row([
                    Cell::new(pds.entry.name()),
                    Cell::new(if pds.enabled { "yes" } else { "no" }),
                    Cell::new(pds.entry.num_cook_passes()),
                    Cell::new(pds.entry.desc()),
                ]);
            }
            println!("{table}");
        }
        SpecCommand::Enable { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            project.enable_data_specs(&names)?;
            println!("enabled: {}", names.join(", "));
        }
        SpecCommand::Disable { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            project.disable_data_specs(&names)?;
            println!("disabled: {}", names.join(", "));
        }
    }
    Ok(())
}

pub fn run_cook(cli: &Cli, args: &CookArgs) -> anyhow::Result<i32> {
    let project = open_project(cli)?;
    install_interrupt_handler();

    let options = CookOptions {
        recursive: args.recursive,
        force: args.force,
        fast: args.fast,
        fail_fast: args.fail_fast,
        spec: args.spec.clone(),
        ..CookOptions::default()
    };
    let pool = args.workers.map(ScopedPool::new);
    let progress = BarProgress::new();
    let outcome = project.cook_all_passes(
        &ProjectPath::new(&args.path)?,
        &progress,
        &options,
        pool.as_ref().map(|p| p as &dyn WorkerPool),
    )?;
    progress.finish();

    match outcome {
        CookOutcome::Completed(stats) => {
            println!(
                "cooked {} object(s), skipped {}, failed {}",
                stats.cooked, stats.skipped, stats.failed
            );
            Ok(if stats.failed > 0 { 1 } else { 0 })
        }
        CookOutcome::Interrupted(stats) => {
            println!("interrupted after {} object(s)", stats.cooked);
            Ok(EXIT_INTERRUPTED)
        }
    }
}

pub fn run_package(cli: &Cli, args: &PackageArgs) -> anyhow::Result<i32> {
    let project = open_project(cli)?;
    install_interrupt_handler();
    kiln_core::reset_interrupt();

    let pool = args.workers.map(ScopedPool::new);
    let progress = BarProgress::new();
    let outcome = project.package_path(
        &ProjectPath::new(&args.path)?,
        &progress,
        args.fast,
        args.spec.as_deref(),
        pool.as_ref().map(|p| p as &dyn WorkerPool),
    )?;
    progress.finish();

    match outcome {
        PackageOutcome::Completed { nodes } => {
            println!("packaged {nodes} node(s)");
            Ok(0)
        }
        PackageOutcome::Interrupted => {
            println!("packaging interrupted");
            Ok(EXIT_INTERRUPTED)
        }
    }
}

pub fn run_clean(cli: &Cli, args: &CleanArgs) -> anyhow::Result<()> {
    let project = open_project(cli)?;
    let path = ProjectPath::new(&args.path)?;
    project.clean_path(&path, args.recursive)?;
    info!(%path, "cleaned cooked outputs");
    Ok(())
}

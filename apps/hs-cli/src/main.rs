use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use hs_app::{AppError, AppResult, DemoOptions, SiteRegistry, project_service, run_service};
use hs_core::Response;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hs-cli")]
#[command(about = "HybridSim CLI - experimental sites for hybrid simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// List sites in a project
    Sites {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Print the project as JSON
    Show {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Serve one session of an actor site
    Actor {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Site ID of the actor
        #[arg(long)]
        site: String,
        /// Listen address, overriding the project
        #[arg(long)]
        bind: Option<String>,
    },
    /// Drive a local or remote site through a displacement ramp
    Demo {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Site ID to drive
        #[arg(long)]
        site: String,
        /// Number of committed steps
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Peak ramp value
        #[arg(long, default_value_t = 0.01)]
        amplitude: f64,
        /// Trial vector entry carrying the ramp
        #[arg(long, default_value_t = 0)]
        dof: usize,
        /// Actor address for a remote site, overriding the project
        #[arg(long)]
        address: Option<String>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Sites { project_path } => cmd_sites(&project_path),
        Commands::Show { project_path } => cmd_show(&project_path),
        Commands::Actor {
            project_path,
            site,
            bind,
        } => cmd_actor(&project_path, &site, bind.as_deref()),
        Commands::Demo {
            project_path,
            site,
            steps,
            amplitude,
            dof,
            address,
        } => cmd_demo(
            &project_path,
            &site,
            DemoOptions {
                steps,
                amplitude,
                dof,
            },
            address.as_deref(),
        ),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    project_service::validate_project(&project)?;
    println!("✓ Project is valid");
    Ok(())
}

fn cmd_sites(project_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let sites = project_service::list_sites(&project);

    if sites.is_empty() {
        println!("No sites found in project");
    } else {
        println!("Sites in project:");
        for site in sites {
            println!(
                "  {} (tag {}) - {} -> {} [trial {}, daq {}]",
                site.id, site.tag, site.kind, site.target, site.size_trial, site.size_daq
            );
        }
    }
    Ok(())
}

fn cmd_show(project_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let json = serde_json::to_string_pretty(&project)
        .map_err(|e| AppError::Project(hs_project::ProjectError::Json(e)))?;
    println!("{json}");
    Ok(())
}

fn cmd_actor(project_path: &Path, site_id: &str, bind: Option<&str>) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let address = run_service::actor_bind(&project, site_id, bind)?;
    println!("Serving actor site {site_id} on {address}");
    let state = run_service::serve_actor(&project, site_id, Some(&address))?;
    println!("✓ Session {state}");
    Ok(())
}

fn cmd_demo(
    project_path: &Path,
    site_id: &str,
    options: DemoOptions,
    address: Option<&str>,
) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let def = project.site(site_id).ok_or_else(|| AppError::NotFound {
        what: "Site",
        id: site_id.to_string(),
    })?;
    let (size_trial, size_daq) = (def.size_trial.to_spec(), def.size_daq.to_spec());

    let mut registry = SiteRegistry::new();
    let tag = registry.insert(site_id, hs_app::open_site(&project, site_id, address)?)?;
    println!("Driving site {site_id} for {} steps", options.steps);

    let result = match registry.get_mut(tag) {
        Some(site) => run_service::run_demo(site.as_mut(), &size_trial, &size_daq, &options),
        None => Err(AppError::NotFound {
            what: "Site",
            id: site_id.to_string(),
        }),
    };
    let closed = registry.close_all();
    let history = result?;
    closed?;

    for step in &history {
        println!("{:>4}  trial {}", step.step, format_response(&step.trial));
        println!("      daq   {}", format_response(&step.daq));
    }
    println!("✓ {} steps committed", history.len());
    Ok(())
}

fn format_response(response: &Response) -> String {
    response
        .iter()
        .map(|(kind, values)| {
            let values: Vec<String> = values.iter().map(|v| format!("{v:.6e}")).collect();
            format!("{kind}=[{}]", values.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

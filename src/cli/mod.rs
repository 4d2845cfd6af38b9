use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DevContainerConfig, ImageCheckMode, ProvisionerSettings};
use crate::core::ImageResolver;
use crate::detection::DescriptorLocator;
use crate::docker::{DockerCliResolver, SkipImageCheck};
use crate::environments::{BringUpOutcome, EnvironmentManager};
use crate::provision::{ProvisioningPlan, ShellRunner};
use crate::templates::DescriptorTemplate;

#[derive(Parser, Debug)]
#[command(name = "devprov", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a descriptor parses and is valid
    Validate {
        /// Descriptor path (discovered in the workdir when omitted)
        path: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
    },
    /// Print the normalized descriptor
    Show {
        path: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
    },
    /// List the provisioning statements in execution order
    Plan {
        path: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
        /// Require a package installation followed by hook registration
        #[arg(long)]
        strict: bool,
    },
    /// Check the base image and run the provisioning sequence once
    Up {
        path: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
        #[arg(
            long,
            env = "DEVPROV_SKIP_IMAGE_CHECK",
            value_parser = clap::builder::BoolishValueParser::new()
        )]
        skip_image_check: bool,
    },
    /// Show the recorded provisioning state
    Status {
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
    },
    /// Forget the recorded state so the environment can be recreated
    Reset {
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
    },
    /// Write a new Python descriptor
    Init {
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "mcr.microsoft.com/devcontainers/python:3")]
        image: String,
        #[arg(long, default_value = "vscode")]
        remote_user: String,
    },
}

fn descriptor_path(path: Option<&Path>, workdir: &Path) -> Result<PathBuf> {
    DescriptorLocator::new(workdir)
        .resolve(path)
        .context("Failed to locate descriptor")
}

async fn load_descriptor(path: &Path) -> Result<DevContainerConfig> {
    DevContainerConfig::from_file(path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn manager(settings: Arc<ProvisionerSettings>, skip_image_check: bool) -> EnvironmentManager {
    let images: Arc<dyn ImageResolver> =
        if skip_image_check || settings.image_check == ImageCheckMode::Skip {
            Arc::new(SkipImageCheck)
        } else {
            Arc::new(DockerCliResolver::new())
        };
    let runner = Arc::new(ShellRunner::new(settings.shell.clone()));
    EnvironmentManager::new(settings, images, runner)
}

pub async fn run(cli: Cli, settings: ProvisionerSettings) -> Result<()> {
    let settings = Arc::new(settings);

    match cli.command {
        Commands::Validate { path, workdir } => {
            let path = descriptor_path(path.as_deref(), &workdir)?;
            let config = load_descriptor(&path).await?;
            config.validate(&settings.privileged_users)?;
            ProvisioningPlan::from_descriptor(&config)?;
            println!("{} {} is valid", style("✓").green(), path.display());
        }
        Commands::Show { path, workdir } => {
            let path = descriptor_path(path.as_deref(), &workdir)?;
            let config = load_descriptor(&path).await?;
            println!("{}", config.to_json_string()?);
        }
        Commands::Plan { path, workdir, strict } => {
            let path = descriptor_path(path.as_deref(), &workdir)?;
            let config = load_descriptor(&path).await?;
            let plan = ProvisioningPlan::from_descriptor(&config)?;
            if strict {
                plan.check_install_then_hooks()?;
            }
            if plan.is_empty() {
                println!("{}", style("No postCreateCommand; nothing to run").yellow());
            }
            for statement in plan.statements() {
                println!(
                    "{:>2}. {} {}",
                    statement.index + 1,
                    style(format!("[{}]", statement.kind)).cyan(),
                    statement.text
                );
            }
        }
        Commands::Up { path, workdir, skip_image_check } => {
            let path = descriptor_path(path.as_deref(), &workdir)?;
            let manager = manager(settings.clone(), skip_image_check);
            match manager.bring_up(&path, &workdir).await? {
                BringUpOutcome::Provisioned(report) => println!(
                    "{} Provisioned {} step(s) in {:.1?}",
                    style("✓").green(),
                    report.completed.len(),
                    report.total_duration()
                ),
                BringUpOutcome::AlreadyProvisioned => {
                    println!("{} Already provisioned", style("✓").green())
                }
            }
        }
        Commands::Status { workdir } => {
            let manager = manager(settings.clone(), true);
            match manager.status(&workdir).await? {
                Some(state) => {
                    println!("Status:      {}", style(state.status).bold());
                    println!("Steps:       {}/{}", state.completed_steps, state.total_steps);
                    println!("Fingerprint: {}", state.fingerprint);
                    if let Some(failure) = state.failure {
                        println!("Failure:     {}", style(failure).red());
                    }
                }
                None => println!("Not provisioned"),
            }
        }
        Commands::Reset { workdir } => {
            let manager = manager(settings.clone(), true);
            if manager.reset(&workdir).await? {
                println!("Removed {}", manager.state_path(&workdir).display());
            } else {
                println!("Nothing to reset");
            }
        }
        Commands::Init { workdir, name, image, remote_user } => {
            let config = DescriptorTemplate::python(&name, &image, &remote_user);
            config.validate(&settings.privileged_users)?;
            let path = workdir.join(".devcontainer").join("devcontainer.json");
            DescriptorTemplate::write_new(&config, &path).await?;
            println!("{} Wrote {}", style("✓").green(), path.display());
        }
    }

    Ok(())
}

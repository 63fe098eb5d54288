use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use explaunch::launch::{launch, LaunchError, LaunchOptions, Outcome};
use explaunch::run::stage::CreateMode;
use explaunch::settings::{ProjectSettings, DEFAULT_SETTINGS_FILE};
use explaunch::slurm::submit::SystemRunner;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the project settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Stage the run and write the job script, but don't submit it
    #[arg(long)]
    dry_run: bool,
    /// Fail instead of overwriting a run directory that appeared after the name was checked
    #[arg(long)]
    exclusive: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<LaunchError>().map_or(1, LaunchError::exit_code);
        process::exit(code);
    }
}

fn run(args: &Args) -> Result<()> {
    info!("Starting launch with settings {}", args.config.display());
    let settings = ProjectSettings::load(&args.config).context("Can't start without project settings")?;

    let options = LaunchOptions {
        dry_run: args.dry_run,
        create_mode: if args.exclusive { CreateMode::Exclusive } else { CreateMode::Shared },
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    match launch(&settings, options, &mut input, &mut output, &SystemRunner)? {
        Outcome::Submitted { run, job } => {
            print!("{}", job.stdout);
            info!("Submitted {}", run.path.display());
        }
        Outcome::DryRun { run, script_path, container_cmd } => {
            println!("Staged {} (not submitted)", run.path.display());
            println!("Submit with: {} {}", settings.scheduler_path.display(), script_path.display());
            println!("Or run locally: {container_cmd}");
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use extras_core::config::{BackendKind, Config, Overrides};
use extras_core::pipeline::CancelFlag;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "packager-extras")]
#[command(about = "Fix the icon of a packaged web app and build a Windows installer for it")]
#[command(version)]
pub struct Cli {
    /// Packaged application archive (.zip)
    archive: PathBuf,

    /// Replace the executable's icon and rezip the archive in place
    #[arg(long)]
    fix_icon: bool,

    /// Build a Windows installer
    #[arg(long)]
    installer: bool,

    /// Where to save the installer [default: "<archive name> Setup.exe" next to the archive]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't ask anything: run both steps unless one is chosen, use the
    /// suggested destination and never retry
    #[arg(short, long)]
    yes: bool,

    /// Path to rcedit
    #[arg(long, value_name = "PATH")]
    rcedit: Option<PathBuf>,

    /// Path to the Inno Setup compiler (iscc)
    #[arg(long, value_name = "PATH")]
    iscc: Option<PathBuf>,

    /// How to patch the icon: rcedit or embedded
    #[arg(long, value_name = "BACKEND")]
    icon_backend: Option<BackendKind>,

    /// Don't show the installer in the file browser when done
    #[arg(long)]
    no_reveal: bool,

    /// Print debug logs
    #[arg(short, long)]
    verbose: bool,
}

/// Conventional exit code after SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Let the running job stop at the next stage boundary
    StopAfterStep,
    ExitNow,
}

/// A job in flight is cancelled cooperatively; a prompt, or a second Ctrl+C,
/// ends the process.
fn on_interrupt(already_cancelled: bool, job_running: bool) -> Interrupt {
    if job_running && !already_cancelled {
        Interrupt::StopAfterStep
    } else {
        Interrupt::ExitNow
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn main() {
    let args = Cli::parse();
    init_logging(args.verbose);

    let overrides = Overrides {
        rcedit: args.rcedit.clone(),
        iscc: args.iscc.clone(),
        icon_backend: args.icon_backend,
    };
    let mut config = match Config::from_env(overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    config.reveal_output = !args.no_reveal;
    log::debug!("Using {:?}", config);

    let cancel = CancelFlag::new();
    let busy = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let job_running = busy.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        match on_interrupt(flag.is_cancelled(), job_running.load(Ordering::SeqCst)) {
            Interrupt::ExitNow => {
                eprintln!("\nInterrupted. Temporary files may be left behind.");
                process::exit(EXIT_INTERRUPTED);
            }
            Interrupt::StopAfterStep => {
                eprintln!(
                    "\nStopping after the current step. \
                     Press Ctrl+C again to quit now (temporary files are not cleaned up then)."
                );
                flag.cancel();
            }
        }
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    match cli::run(&args, config, cancel, &busy) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

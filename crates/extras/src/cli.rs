use crate::Cli;
use extras_core::PipelineError;
use extras_core::config::Config;
use extras_core::installer::suggested_destination;
use extras_core::pipeline::{CancelFlag, Event, Options, Outcome, Session};
use extras_core::reveal;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit code when the run failed and was not retried
const EXIT_FAILED: i32 = 1;
/// Exit code for errors that stop the tool before or outside a run
const EXIT_ERROR: i32 = 2;

fn print_event<W: Write>(out: &mut W, event: &Event) -> io::Result<()> {
    match event {
        Event::StateChanged(state) => {
            log::debug!("State: {}", state);
            Ok(())
        }
        Event::Progress(text) => writeln!(out, "{}...", text),
        // Outcome is reported by the caller
        Event::Finished(_) => Ok(()),
    }
}

/// Block on the session's job, printing progress. `busy` is set for the duration.
fn wait_for_job<W: Write>(
    session: &mut Session,
    busy: &AtomicBool,
    out: &mut W,
) -> Result<Outcome, PipelineError> {
    busy.store(true, Ordering::SeqCst);
    let outcome = session.wait(|event| {
        if let Err(e) = print_event(out, event) {
            log::warn!("Failed to print progress: {}", e);
        }
    });
    busy.store(false, Ordering::SeqCst);
    outcome
}

/// Interpret a yes/no answer. Empty means `default`; anything unrecognized is `None`.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Interpret the answer to the destination question.
///
/// Empty accepts the suggestion, `n` cancels, anything else is a path.
pub fn parse_destination(answer: &str, suggestion: &Path) -> Option<PathBuf> {
    let answer = answer.trim();
    if answer.is_empty() {
        Some(suggestion.to_path_buf())
    } else if answer.eq_ignore_ascii_case("n") {
        None
    } else {
        Some(PathBuf::from(answer))
    }
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<String> {
    write!(out, "{}", question)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer)
}

/// Ask until the answer is a yes or a no. End of input counts as `default`.
pub fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
    default: bool,
) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        let answer = read_answer(input, out, &format!("{} {} ", question, hint))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match parse_yes_no(&answer, default) {
            Some(choice) => return Ok(choice),
            None => writeln!(out, "Please answer y or n.")?,
        }
    }
}

/// Which steps to run. Flags win; with neither flag set, `--yes` picks both and
/// otherwise the user is asked, both defaulting to yes.
pub fn choose_options<R: BufRead, W: Write>(
    args: &Cli,
    input: &mut R,
    out: &mut W,
) -> io::Result<Options> {
    if args.fix_icon || args.installer {
        return Ok(Options {
            fix_icon: args.fix_icon,
            create_installer: args.installer,
        });
    }
    if args.yes {
        return Ok(Options::all());
    }
    Ok(Options {
        fix_icon: ask_yes_no(input, out, "Fix icon?", true)?,
        create_installer: ask_yes_no(input, out, "Create installer?", true)?,
    })
}

/// Where to save the installer, or `None` when the user cancels.
pub fn choose_destination<R: BufRead, W: Write>(
    args: &Cli,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<PathBuf>> {
    if let Some(output) = &args.output {
        return Ok(Some(output.clone()));
    }
    let suggestion = suggested_destination(&args.archive);
    if args.yes {
        return Ok(Some(suggestion));
    }
    let answer = read_answer(
        input,
        out,
        &format!(
            "Save installer as {}? [Enter to accept, a path to change, n to cancel] ",
            suggestion.display()
        ),
    )?;
    Ok(parse_destination(&answer, &suggestion))
}

/// Drive one archive through the pipeline. Returns the exit code.
///
/// `busy` is true while a job is running, for the Ctrl+C handler.
pub fn run(
    args: &Cli,
    config: Config,
    cancel: CancelFlag,
    busy: &AtomicBool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    run_with(args, config, cancel, busy, &mut input, &mut out, |path| {
        reveal::reveal_in_file_browser(path)
    })
}

fn run_with<R, W, V>(
    args: &Cli,
    config: Config,
    cancel: CancelFlag,
    busy: &AtomicBool,
    input: &mut R,
    out: &mut W,
    mut reveal: V,
) -> Result<i32, Box<dyn std::error::Error>>
where
    R: BufRead,
    W: Write,
    V: FnMut(&Path),
{
    let reveal_output = config.reveal_output;
    let mut session = Session::with_cancel_flag(config, cancel.clone());

    writeln!(out, "Opening {}", args.archive.display())?;
    session.open(&args.archive)?;
    match wait_for_job(&mut session, busy, out)? {
        Outcome::Extracted { root } => writeln!(out, "Extracted to {}", root.display())?,
        Outcome::Failed { message, .. } => {
            eprintln!("Error: {}", message);
            return Ok(EXIT_ERROR);
        }
        Outcome::Succeeded { .. } => {}
    }

    loop {
        let options = choose_options(args, input, out)?;
        let destination = if options.create_installer {
            choose_destination(args, input, out)?
        } else {
            None
        };

        match session.execute(options, destination) {
            Ok(()) => {}
            Err(e @ (PipelineError::NoOptionSelected | PipelineError::NoDestinationSelected)) => {
                eprintln!("Error: {}", e);
                if args.yes || !ask_yes_no(input, out, "Choose again?", true)? {
                    return Ok(EXIT_FAILED);
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        match wait_for_job(&mut session, busy, out)? {
            Outcome::Succeeded { installer } => {
                writeln!(out, "\nDone!")?;
                if let Some(path) = installer {
                    writeln!(out, "Installer saved to {}", path.display())?;
                    out.flush()?;
                    if reveal_output {
                        reveal(&path);
                    }
                }
                return Ok(0);
            }
            Outcome::Failed { message, .. } => {
                eprintln!("\nError: {}", message);
                if args.yes || cancel.is_cancelled() {
                    return Ok(EXIT_FAILED);
                }
                if !ask_yes_no(input, out, "Try again?", false)? {
                    return Ok(EXIT_FAILED);
                }
            }
            Outcome::Extracted { .. } => {}
        }
    }
}

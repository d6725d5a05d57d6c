#![cfg(not(tarpaulin_include))]

use sheetgenius::config::AppConfig;
use sheetgenius::mailer::Mailer;
use sheetgenius::pipeline::SubmissionPipeline;
use sheetgenius::validator::UploadCandidate;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "Usage: sheetgenius-cli <file> <recipient> [--out <dir>] [--no-email]";

struct Args {
    file: PathBuf,
    recipient: String,
    out: PathBuf,
    email: bool,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut positional = Vec::new();
    let mut out = PathBuf::from(".");
    let mut email = true;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => out = PathBuf::from(iter.next()?),
            "--no-email" => email = false,
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        return None;
    }
    Some(Args {
        file: PathBuf::from(&positional[0]),
        recipient: positional[1].clone(),
        out,
        email,
    })
}

/// Run the report pipeline on a local file
///
/// Uses the same environment configuration as the web server. The archive is
/// written to `--out` whether or not the email went out.
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(args) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    match run(&args) {
        Ok(path) => {
            println!("Report written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config = Arc::new(AppConfig::from_env());
    let mailer = match (&config.mail, args.email) {
        (Some(settings), true) => Some(Arc::new(Mailer::new(settings)?)),
        _ => None,
    };
    let pipeline = SubmissionPipeline::new(config, mailer)?;

    let file = File::open(&args.file)?;
    let mut candidate = UploadCandidate {
        filename: display_name(&args.file),
        declared_size: file.metadata()?.len(),
        stream: file,
    };

    let outcome = pipeline.process_submission(&mut candidate, &args.recipient)?;
    for degraded in &outcome.degraded {
        eprintln!("Warning: {} skipped ({})", degraded.step, degraded.reason);
    }
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {}", warning);
    }

    Ok(outcome.save_archive(&args.out)?)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

use clap::Parser;
use ro2ct::convert::{self, ConvertOptions, FileOutcome};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ro2ct")]
#[command(about = "Convert RO2 .ct tables to and from spreadsheets", long_about = None)]
struct Cli {
    /// File or directory to convert (.ct → .xlsx; .xlsx/.csv → .ct).
    path: PathBuf,
    /// Descend into subdirectories when PATH is a directory.
    #[arg(short, long)]
    recursive: bool,
    /// Print the batch report as JSON instead of per-file lines.
    #[arg(long)]
    json: bool,
    /// Suppress per-file output.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !cli.path.exists() {
        eprintln!("error: no such file or directory: {}", cli.path.display());
        return ExitCode::from(2);
    }

    let opts = ConvertOptions { recurse: cli.recursive };
    let silent = cli.quiet || cli.json;
    let mut progress = |outcome: &FileOutcome| {
        if silent {
            return;
        }
        match (&outcome.output, &outcome.error) {
            (Some(output), _) => {
                println!("Converted: {} -> {}", outcome.input.display(), output.display())
            }
            (None, Some(error)) => eprintln!("Failed: {}: {error}", outcome.input.display()),
            (None, None) => {}
        }
    };

    let outcomes = match convert::convert_path_with(&cli.path, &opts, None, Some(&mut progress)) {
        Ok(outcomes) => outcomes,
        Err(convert::ConvertError::UnsupportedExtension(path)) => {
            eprintln!("error: unsupported extension: {}", path.display());
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&outcomes) {
            Ok(report) => println!("{report}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else if !cli.quiet {
        let ok = outcomes.iter().filter(|o| o.succeeded()).count();
        println!("{ok}/{} file(s) converted", outcomes.len());
    }

    if outcomes.iter().all(FileOutcome::succeeded) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mizreplace_core::{
    report_path, run, ReplaceSettings, SearchDefaults, MISSION_ENTRY, REQUIRED_MODULES_MARKER,
};

#[derive(Debug, Parser)]
#[command(
    name = "mizreplace",
    version,
    about = "Rewrite the requiredModules table inside a .miz mission archive"
)]
struct Args {
    /// Mission archive to read.
    #[arg(value_name = "INPUT.miz")]
    input: PathBuf,

    /// Archive to write. Must not resolve to the same file as the input.
    #[arg(value_name = "OUTPUT.miz")]
    output: PathBuf,

    /// Literal text to look for inside the requiredModules block.
    #[arg(allow_hyphen_values = true)]
    search: Option<String>,

    /// Replacement text. Only honoured when a search string is given.
    #[arg(allow_hyphen_values = true)]
    replace: Option<String>,

    /// Archive entry to edit.
    #[arg(long, default_value = MISSION_ENTRY)]
    entry: String,

    /// Keyword that introduces the brace block to edit.
    #[arg(long, default_value = REQUIRED_MODULES_MARKER)]
    marker: String,

    /// Log every entry and write a JSON run report next to the output.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Args {
    fn uses_defaults(&self) -> bool {
        self.search.is_none()
    }

    fn into_settings(self, defaults: &SearchDefaults) -> ReplaceSettings {
        let (search, replace) = defaults.resolve(self.search, self.replace);
        ReplaceSettings {
            input_path: self.input,
            output_path: self.output,
            search,
            replace,
            target_entry: self.entry,
            marker: self.marker,
            debug: self.debug,
        }
    }
}

/// Help and version requests succeed; every other parse failure is a usage
/// error and exits 1 like the rest of the tool's failures.
fn exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(exit_code(&err));
        }
    };

    init_tracing(args.debug);

    let defaults = SearchDefaults::default();
    if args.uses_defaults() {
        println!("Using default search string: {}", defaults.search);
        println!("Using default replace string: {}", defaults.replace);
    }

    let settings = args.into_settings(&defaults);
    tracing::debug!(
        input = %settings.input_path.display(),
        output = %settings.output_path.display(),
        entry = %settings.target_entry,
        marker = %settings.marker,
        search = %settings.search,
        replace = %settings.replace,
        "resolved settings"
    );

    let report = match run(&settings) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    if report.changed {
        println!("Replacement done in {}.", settings.marker);
    } else {
        println!(
            "Warning: no replacement made ({} or search string not found).",
            settings.marker
        );
    }

    if settings.debug {
        println!("Run report: {}", report_path(&settings.output_path).display());
    }

    println!("Output written to: {}", settings.output_path.display());
}

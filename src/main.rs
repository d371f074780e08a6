use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use deltacov::check;
use deltacov::cli::{self, CheckArgs, DiffArgs, Style};
use deltacov::config::Config;

/// deltacov: coverage verification restricted to the lines changed by a diff.
#[derive(Parser)]
#[command(name = "deltacov", version, about)]
struct Cli {
    /// Config file (default: <ROOT>/deltacov.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that relative paths and `git diff` resolve against.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log progress at info level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log at debug level.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check coverage of the changed lines against the configured rules.
    Check {
        #[command(flatten)]
        args: CheckArgs,

        /// Output style.
        #[arg(long, value_enum, default_value_t = Style::Text)]
        style: Style,
    },

    /// Print the lines a diff changes, per file.
    ModifiedLines {
        #[command(flatten)]
        diff: DiffArgs,

        /// Path prefix to prepend to diff paths.
        #[arg(long)]
        path_prefix: Option<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let mut config = Config::discover(&cli.root, cli.config.as_deref())?;

    match cli.command {
        Commands::Check { args, style } => {
            args.apply_to(&mut config);
            let (output, outcome) = cli::cmd_check(&config, &cli.root, style)?;
            print!("{output}");
            match check::enforce(&outcome.violations, config.violations.fail_on_violation) {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(err) => {
                    eprintln!("{err}");
                    Ok(ExitCode::from(1))
                }
            }
        }
        Commands::ModifiedLines { diff, path_prefix } => {
            diff.apply_to(&mut config.diff);
            let prefix = path_prefix.or(config.coverage.path_prefix.clone());
            print!(
                "{}",
                cli::cmd_modified_lines(&config.diff, &cli.root, prefix.as_deref())?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize tracing based on CLI flags. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

use edtarget::{
    backend::{BackendArg, BackendSelector},
    commands,
    config::Settings,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "edtarget")]
#[command(about = "Point rust-analyzer in VS Code and Emacs at one build target")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Log more detail to stderr (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Project directory (default: discovered from the current directory)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Settings file to use instead of the project or user config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch editors to a target (prompts when none is given)
    Switch {
        /// Target name: web, desktop, ios, android
        target: Option<String>,

        /// Backends to write (repeatable or comma-separated)
        #[arg(long, short, value_enum, value_delimiter = ',')]
        backend: Vec<BackendArg>,

        /// Do not ask running editors to reload
        #[arg(long)]
        no_reload: bool,
    },

    /// Show the target each editor is configured for
    Status {
        #[arg(long, short, value_enum, value_delimiter = ',')]
        backend: Vec<BackendArg>,
    },

    /// Ask running editors to reload their configuration
    Reload {
        #[arg(long, short, value_enum, value_delimiter = ',')]
        backend: Vec<BackendArg>,
    },

    /// Swap editor files with their backups
    Restore {
        #[arg(long, short, value_enum, value_delimiter = ',')]
        backend: Vec<BackendArg>,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// List available targets
    Targets,

    /// Run diagnostics on the project setup
    Doctor,

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if verbose > 0 {
        let directive = if verbose > 1 { "edtarget=trace" } else { "edtarget=debug" };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "edtarget", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let ui = Ui::new(cli.color, cli.no_color);
    let paths = Paths::resolve(cli.project_dir.as_deref())?;
    // Read-only commands still run on a broken config file
    let read_only = matches!(
        cli.command,
        Commands::Status { .. } | Commands::Reload { .. } | Commands::Targets
    );
    let (settings, config_source) = if read_only {
        let (settings, err) = Settings::load_or_default(&paths, cli.config.as_deref());
        if let Some(e) = err {
            ui.warn(format!("{e:#}; using default settings"));
        }
        (settings, None)
    } else {
        Settings::load(&paths, cli.config.as_deref())?
    };
    let default = settings.default_selector();
    let select = |args: &[BackendArg]| BackendSelector::from_args(args, &default);

    let success = match cli.command {
        Commands::Switch {
            target,
            backend,
            no_reload,
        } => commands::switch(
            &paths,
            &settings,
            target.as_deref(),
            &select(&backend),
            !no_reload,
            &ui,
        )?,
        Commands::Status { backend } => {
            commands::status(&paths, &select(&backend), &ui)?;
            true
        }
        Commands::Reload { backend } => {
            commands::reload(&paths, &settings, &select(&backend), &ui)?;
            true
        }
        Commands::Restore { backend, yes } => {
            commands::restore(&paths, &select(&backend), yes, &ui)?
        }
        Commands::Targets => {
            commands::targets(&paths, &default, &ui)?;
            true
        }
        Commands::Doctor => commands::doctor(&paths, &settings, config_source.as_deref(), &ui)?,
        Commands::Completions { .. } => true,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

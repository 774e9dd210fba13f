mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_DEFINITION_ERROR, EXIT_FAILURE, EXIT_RUNTIME_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "labrig",
    version,
    about = "Declarative multi-node lab compiler for containerlab"
)]
struct Cli {
    /// Base directory for lab state.
    #[arg(long, default_value = "~/.local/share/labrig", global = true)]
    base_dir: String,

    /// Orchestrator backend ("clab" or "mock").
    #[arg(long, default_value = "clab", global = true)]
    backend: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a lab definition and deploy it.
    Start {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Tear down a deployed lab, keeping its state directories.
    Stop {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Tear down a lab and remove all of its state.
    Destroy {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Show deployment state of a lab's nodes.
    Status {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Print the compiled topology document without deploying.
    Topology {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Report whether a running lab matches its definition.
    Check {
        /// Path to the lab definition file.
        #[arg(default_value = "lab.toml")]
        lab: PathBuf,
    },
    /// Run a command inside a node of the running lab.
    Exec {
        /// Node name as declared in the lab definition.
        node: String,
        /// Path to the lab definition file.
        #[arg(long, default_value = "lab.toml")]
        lab: PathBuf,
        /// Command and arguments to run (after --).
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LABRIG_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let base_dir = expand_tilde(&cli.base_dir);
    let backend = cli.backend.clone();
    let json = cli.json;

    let result = match cli.command {
        Commands::Start { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|mut engine| commands::start::run(&mut engine, json)),
        Commands::Stop { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|mut engine| commands::stop::run(&mut engine)),
        Commands::Destroy { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|mut engine| commands::destroy::run(&mut engine)),
        Commands::Status { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|engine| commands::status::run(&engine, json)),
        Commands::Topology { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|engine| commands::topology::run(&engine)),
        Commands::Check { lab } => commands::make_engine(&lab, &base_dir, &backend)
            .and_then(|engine| commands::check::run(&engine)),
        Commands::Exec { node, lab, command } => {
            commands::make_engine(&lab, &base_dir, &backend)
                .and_then(|engine| commands::exec::run(&engine, &node, &command))
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("definition error:") {
                EXIT_DEFINITION_ERROR
            } else if msg.starts_with("runtime error:") {
                EXIT_RUNTIME_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

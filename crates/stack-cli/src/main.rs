mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_DIRTY_TREE, EXIT_FAILURE};
use stack_core::{
    install_signal_handler, Backends, CheckoutOptions, DownOptions, LogOptions, Orchestrator,
    ReupOptions, StackLock, UpOptions,
};
use stack_runtime::{Confirm, FixedAnswer, TerminalConfirm};
use stack_schema::ConfigStore;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "stack",
    version,
    about = "Run a local multi-service Docker development stack"
)]
struct Cli {
    /// Root of the stack (the directory holding docker-compose.yml and stack.yml).
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output results as structured JSON where supported.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(short, long, default_value_t = false, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Re-clone app subtrees from their configured repository and branch.
    Init {
        /// Only this app.
        app: Option<String>,
    },
    /// Validate build contexts, bind mounts and images.
    Check {
        /// Only this app.
        app: Option<String>,
    },
    /// Build images of built apps without cache.
    Build {
        /// Only this app.
        app: Option<String>,
        /// Remove existing images first.
        #[arg(long, default_value_t = false)]
        clean: bool,
    },
    /// Remove local images of built apps.
    Clean {
        /// Only this app.
        app: Option<String>,
    },
    /// Bring the whole stack up.
    Up {
        /// Run detached.
        #[arg(short, default_value_t = false)]
        detached: bool,
        /// Remove and rebuild images first.
        #[arg(long, default_value_t = false)]
        clean: bool,
        /// Extra compose flags, comma separated (e.g. 'build,remove-orphans').
        #[arg(long)]
        flags: Option<String>,
    },
    /// Bring the whole stack down.
    Down {
        /// Remove volumes as well.
        #[arg(long, default_value_t = false)]
        clean: bool,
        /// Extra compose flags, comma separated.
        #[arg(long)]
        flags: Option<String>,
    },
    /// Recreate one app's container.
    Reup {
        /// App to recreate.
        app: String,
        /// Remove and rebuild the app's image first.
        #[arg(short, long, default_value_t = false)]
        clean: bool,
        /// Drop and recreate the app's database.
        #[arg(short, long, default_value_t = false)]
        purge: bool,
        /// Let compose recreate dependent services too.
        #[arg(short, long, default_value_t = false)]
        recreate: bool,
        /// Accepted for compatibility; the app is always started detached.
        #[arg(short, default_value_t = false)]
        detached: bool,
        /// Extra compose flags, comma separated.
        #[arg(long)]
        flags: Option<String>,
    },
    /// Add an app's repository as a subtree.
    Clone {
        app: String,
        branch: String,
    },
    /// Switch an app subtree to another branch.
    Checkout {
        app: String,
        branch: String,
        /// Split the current subtree onto a new branch instead.
        #[arg(short = 'b', default_value_t = false)]
        new_branch: bool,
    },
    /// Replace app subtrees with fresh copies of their configured branch.
    Update {
        /// Only this app.
        app: Option<String>,
    },
    /// Pull upstream changes into an app subtree.
    Pull {
        app: String,
        branch: String,
        /// Squash upstream history into one commit.
        #[arg(long, default_value_t = false)]
        squash: bool,
    },
    /// Show container status of apps.
    Status {
        /// Only this app.
        app: Option<String>,
    },
    /// Show an app's logs.
    Logs {
        app: String,
        /// Only logs from the last N minutes.
        #[arg(long)]
        minutes: Option<u32>,
        /// Only the last N lines.
        #[arg(long)]
        lines: Option<u32>,
        /// Keep following the logs.
        #[arg(short = 'F', long, default_value_t = false)]
        follow: bool,
    },
    /// Open a shell in an app's running container.
    Shell {
        app: String,
        /// Use /bin/sh if bash is not available.
        #[arg(long, default_value_t = false)]
        sh: bool,
    },
    /// Build, upload and reinstall stack packages.
    Packages {
        /// Only this package.
        package: Option<String>,
    },
    /// Fetch the stack's secrets into .env.
    Secrets {
        /// Overwrite an existing .env.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Run diagnostic checks on the tools and the stack.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

impl Commands {
    /// Commands that change the checkout, images or containers.
    fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Init { .. }
                | Self::Build { .. }
                | Self::Clean { .. }
                | Self::Up { .. }
                | Self::Down { .. }
                | Self::Reup { .. }
                | Self::Clone { .. }
                | Self::Checkout { .. }
                | Self::Update { .. }
                | Self::Pull { .. }
                | Self::Packages { .. }
                | Self::Secrets { .. }
        )
    }

    /// Commands that drive docker, compose or git.
    fn needs_tools(&self) -> bool {
        !matches!(
            self,
            Self::Secrets { .. } | Self::Doctor | Self::Completions { .. } | Self::ManPages { .. }
        )
    }
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
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STACK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let result = match cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { ref dir } => commands::man_pages::run::<Cli>(dir),
        Commands::Doctor => commands::doctor::run(&cli.root, cli.json),
        _ => run_in_stack(cli),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("configuration error:") {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("dirty working tree:") {
        EXIT_DIRTY_TREE
    } else {
        EXIT_FAILURE
    }
}

/// Validate the stack, take the lock when needed, and dispatch.
fn run_in_stack(cli: Cli) -> Result<u8, String> {
    let config = ConfigStore::new(&cli.root);
    if !config.check_stack() {
        return Err("configuration error: the stack is invalid, cannot run".to_owned());
    }

    if cli.command.needs_tools() && std::env::var("STACK_SKIP_PREREQS").as_deref() != Ok("1") {
        check_tools(&config)?;
    }

    let _lock = if cli.command.is_mutating() {
        Some(acquire_lock(config.root())?)
    } else {
        None
    };

    let confirm: Arc<dyn Confirm> = if cli.yes {
        Arc::new(FixedAnswer(true))
    } else {
        Arc::new(TerminalConfirm)
    };
    let backends = Backends::system(config.root(), confirm);
    let orch = Orchestrator::new(config, backends).map_err(|e| e.to_string())?;
    dispatch(&orch, cli.command, cli.json)
}

fn check_tools(config: &ConfigStore) -> Result<(), String> {
    let compose = config
        .stack()
        .map_err(|e| e.to_string())?
        .compose_command()
        .into_iter()
        .next()
        .unwrap_or_default();
    let missing: Vec<_> = stack_runtime::check_tool_prereqs(&compose)
        .into_iter()
        .filter(|m| m.required)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(stack_runtime::format_missing(&missing))
    }
}

fn acquire_lock(root: &Path) -> Result<StackLock, String> {
    match StackLock::try_acquire(root).map_err(|e| format!("stack lock: {e}"))? {
        Some(lock) => Ok(lock),
        None => {
            eprintln!("waiting for another stack command to finish...");
            StackLock::acquire(root).map_err(|e| format!("stack lock: {e}"))
        }
    }
}

fn dispatch(orch: &Orchestrator, command: Commands, json: bool) -> Result<u8, String> {
    match command {
        Commands::Init { app } => commands::init::run(orch, app.as_deref()),
        Commands::Check { app } => commands::check::run(orch, app.as_deref()),
        Commands::Build { app, clean } => commands::build::run(orch, app.as_deref(), clean),
        Commands::Clean { app } => commands::clean::run(orch, app.as_deref()),
        Commands::Up {
            detached,
            clean,
            flags,
        } => commands::up::run(
            orch,
            &UpOptions {
                detached,
                clean,
                flags,
            },
        ),
        Commands::Down { clean, flags } => {
            commands::down::run(orch, &DownOptions { clean, flags })
        }
        Commands::Reup {
            app,
            clean,
            purge,
            recreate,
            detached: _,
            flags,
        } => commands::reup::run(
            orch,
            &app,
            &ReupOptions {
                clean,
                purge,
                recreate,
                flags,
            },
        ),
        Commands::Clone { app, branch } => commands::clone::run(orch, &app, &branch),
        Commands::Checkout {
            app,
            branch,
            new_branch,
        } => commands::checkout::run(orch, &app, &branch, CheckoutOptions { new_branch }),
        Commands::Update { app } => commands::update::run(orch, app.as_deref()),
        Commands::Pull {
            app,
            branch,
            squash,
        } => commands::pull::run(orch, &app, &branch, squash),
        Commands::Status { app } => commands::status::run(orch, app.as_deref(), json),
        Commands::Logs {
            app,
            minutes,
            lines,
            follow,
        } => commands::logs::run(
            orch,
            &app,
            &LogOptions {
                minutes,
                lines,
                follow,
            },
        ),
        Commands::Shell { app, sh } => commands::shell::run(orch, &app, sh),
        Commands::Packages { package } => commands::packages::run(orch, package.as_deref()),
        Commands::Secrets { force } => commands::secrets::run(orch, force),
        Commands::Doctor | Commands::Completions { .. } | Commands::ManPages { .. } => {
            Err("command does not run inside a stack".to_owned())
        }
    }
}

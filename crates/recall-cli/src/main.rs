//! `recall-cli` – interactive shell over the Recall memory stores.
//!
//! 1. Initialises tracing (`RUST_LOG`, `RECALL_LOG_FORMAT`, optional OTLP).
//! 2. Loads `~/.recall/config.toml`, falling back to defaults.
//! 3. Opens the orchestrator on a multi-thread tokio runtime.
//! 4. Runs a slash-command REPL until `/quit`, EOF or Ctrl-C, then performs a
//!    final save and releases the storage lock.

mod repl;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use recall_runtime::{Orchestrator, config};
use tracing::{error, warn};

fn main() -> ExitCode {
    let _telemetry = recall_runtime::init_tracing("recall");

    print_banner();

    let cfg = match config::resolve() {
        Ok(cfg) => {
            println!(
                "  Config: {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::RecallConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    println!(
        "  Storage: {}",
        cfg.storage_dir.display().to_string().dimmed()
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let recall = match runtime.block_on(Orchestrator::open(&cfg)) {
        Ok(recall) => recall,
        Err(e) => {
            println!("{}: {}", "Failed to open memory store".red(), e);
            return ExitCode::FAILURE;
        }
    };

    install_ctrlc_handler(runtime.handle().clone(), Arc::clone(&recall));

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(runtime.handle(), &recall);

    match runtime.block_on(recall.shutdown()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}: {}", "Final save failed".red(), e);
            ExitCode::FAILURE
        }
    }
}

/// On Ctrl-C: save, release the lock and exit.
fn install_ctrlc_handler(handle: tokio::runtime::Handle, recall: Arc<Orchestrator>) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – saving and exiting …".yellow().bold());
        let code = match handle.block_on(recall.shutdown()) {
            Ok(()) => {
                println!("{}", "  ✓ Memories saved.".green());
                0
            }
            Err(e) => {
                println!("{}: {}", "  Final save failed".red(), e);
                1
            }
        };
        std::process::exit(code);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; use /quit to exit cleanly");
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___                 ____"#.bold().cyan());
    println!("{}", r#"  / _ \___ _______ _  / / /"#.bold().cyan());
    println!("{}", r#" / , _/ -_) __/ _ `/ / / / "#.bold().cyan());
    println!("{}", r#"/_/|_|\__/\__/\_,_/_/_/_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Recall".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Associative memory and thought tracking");
    println!();
}

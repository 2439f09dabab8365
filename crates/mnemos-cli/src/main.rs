//! `mnemos` – interactive shell over the mnemos memory layer.
//!
//! 1. Checks for `~/.mnemos/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Initialises logging (quiet / verbose / `RUST_LOG`) and, when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set, span export.
//! 3. Opens the local database, or connects to a remote server.
//! 4. Drops the user into an **interactive REPL** with slash-commands.
//! 5. Intercepts **Ctrl-C** to leave the REPL cleanly.

mod config;
mod repl;
mod session;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use mnemos_runtime::init_tracing;
use session::Session;

fn main() {
    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    // ── Structured logging ────────────────────────────────────────────────
    let _otel_guard = init_tracing("mnemos", cfg.log_settings());

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – leaving mnemos …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Client ────────────────────────────────────────────────────────────
    let data_dir = config::data_dir();
    let client = match session::build_client(&cfg, &data_dir) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}: {}", "Failed to open memory".red(), e);
            std::process::exit(1);
        }
    };

    match &cfg.remote {
        Some(remote) => println!("  Mode   : {} ({})", "remote".yellow(), remote.url.bold()),
        None => println!(
            "  Mode   : {} ({})",
            "local".green(),
            cfg.database_path(&data_dir).display().to_string().bold()
        ),
    }
    println!("  Model  : {}", cfg.default_model.yellow());
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(Session::new(client, cfg), &runtime, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       mnemos First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up mnemos.\n");

    let mut cfg = config::Config::default();

    cfg.database = prompt_line(&format!("  Database name [{}]: ", cfg.database), &cfg.database);

    println!("  Which generation provider would you like to use?");
    println!("    1) Local AI via Ollama  (default, offline-first)");
    println!("    2) OpenAI-compatible endpoint");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    if choice.trim() == "2" {
        let url = prompt_line("  Endpoint URL [https://api.openai.com]: ", "https://api.openai.com");
        let key = prompt_line("  API key (leave empty for none): ", "");
        cfg.providers = vec![config::ProviderConfig {
            name: "openai".to_string(),
            url,
            api_key: config::ApiKey::new(key),
            models: vec!["*".to_string()],
        }];
        cfg.default_model = "gpt-4o-mini".to_string();
    }
    cfg.default_model = prompt_line(
        &format!("  Default model [{}]: ", cfg.default_model),
        &cfg.default_model,
    );

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ _  ___  ___ __ _  ___  ___"#.bold().cyan());
    println!("{}", r#"  /  ' \/ _ \/ -_)  ' \/ _ \(_-<"#.bold().cyan());
    println!("{}", r#" /_/_/_/_//_/\__/_/_/_/\___/___/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "mnemos".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Schema-typed memory for LLM agents");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

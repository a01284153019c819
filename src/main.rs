//! Lending Bot: command-line entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the assistants backend and the pipeline (indexing `--file`s)
//!   6. Answer the one-shot prompt, or run the console until Ctrl-C
//!      (with `-i`, a prompt on the command line is the first turn)
//!   7. Shut the pipeline down (temporary index cleanup)

use tokio_util::sync::CancellationToken;
use tracing::info;

use lending_bot::assistants::backends;
use lending_bot::console;
use lending_bot::error::AppError;
use lending_bot::indexing::resolve_paths;
use lending_bot::pipeline::LendingBotPipeline;
use lending_bot::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args()?;

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        backend = %config.assistant.backend,
        model = %config.assistant.model,
        log_level = %effective_log_level,
        "config loaded"
    );

    let prompt = args.prompt.join(" ");
    if !args.interactive && prompt.trim().is_empty() {
        return Err(AppError::Config(
            "nothing to do: pass a prompt or -i for the console (see --help)".into(),
        ));
    }

    let backend = backends::build(&config)?;
    let temp_files = resolve_paths(&std::env::current_dir()?, &args.files);
    let pipeline = LendingBotPipeline::build(&config, backend, &temp_files).await?;

    let result = if args.interactive {
        let shutdown = CancellationToken::new();
        let ctrl_c_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                ctrl_c_token.cancel();
            }
        });
        // Words after -i become the first console turn.
        let first_prompt = Some(prompt.as_str()).filter(|p| !p.trim().is_empty());
        console::run_console(&pipeline, first_prompt, shutdown).await
    } else {
        match pipeline.run(&prompt).await {
            Ok(reply) => {
                let mut stdout = std::io::stdout();
                console::write_reply(&mut stdout, &reply).map_err(AppError::from)
            }
            Err(e) => Err(e),
        }
    };

    pipeline.shutdown().await;
    result
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
    files: Vec<String>,
    prompt: Vec<String>,
}

fn print_help() {
    println!("Usage: lending-bot [OPTIONS] [PROMPT...]");
    println!();
    println!("With -i, PROMPT is sent as the first console message.");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -i, --interactive          Start the interactive console");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("      --file <PATH>          Index a local file for file_search (repeatable)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
}

fn parse_cli_args() -> Result<CliArgs, AppError> {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;
    let mut files = Vec::new();
    let mut prompt = Vec::new();

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            prompt.extend(iter.by_ref());
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config("-f/--config requires a path argument".into()))?;
                config_path = Some(path);
            }
            "--file" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config("--file requires a path argument".into()))?;
                files.push(path);
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            a if a.starts_with('-') && a.len() > 1 => {
                return Err(AppError::Config(format!("unknown option: {a}")));
            }
            _ => prompt.push(arg),
        }
    }

    // Each -v raises verbosity one tier from the config default:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    Ok(CliArgs { log_level, interactive, config_path, files, prompt })
}

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use copilot_cli::{run, CommandKind, CommonOptions};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --root".to_string())?;
                options.root = Some(PathBuf::from(value));
                index += 2;
            }
            "--endpoint" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --endpoint".to_string())?;
                options.endpoint = Some(value.clone());
                index += 2;
            }
            "--timeout-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --timeout-ms".to_string())?;
                options.timeout_ms = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid --timeout-ms value '{value}' (expected u64)"))?,
                );
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let no_args = |name: &str| {
        if command_args.is_empty() {
            Ok(())
        } else {
            Err(format!("{name} takes no arguments"))
        }
    };

    let kind = match command {
        "generate" => {
            if command_args.is_empty() {
                return Err("generate requires a prompt".to_string());
            }
            CommandKind::Generate {
                prompt: command_args.join(" "),
            }
        }
        "compile-finished" => {
            no_args("compile-finished")?;
            CommandKind::CompileFinished
        }
        "replay" => {
            no_args("replay")?;
            CommandKind::Replay
        }
        "pending" => {
            no_args("pending")?;
            CommandKind::Pending
        }
        "salvage" => match command_args {
            [path] => CommandKind::Salvage { path: path.clone() },
            _ => return Err("salvage requires exactly one file path".to_string()),
        },
        "clear" => {
            no_args("clear")?;
            CommandKind::Clear
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "copilot_cli - prompt-to-scene copilot",
        "",
        "Usage:",
        "  copilot_cli [--root <dir>] [--endpoint <url>] [--timeout-ms <u64>] generate <prompt...>",
        "  copilot_cli [--root <dir>] compile-finished",
        "  copilot_cli [--root <dir>] replay",
        "  copilot_cli [--root <dir>] pending",
        "  copilot_cli [--root <dir>] clear",
        "  copilot_cli salvage <file>",
        "",
        "Environment:",
        "  COPILOT_ROOT          project root (default: nearest ancestor with Assets/)",
        "  COPILOT_ENDPOINT      chat endpoint (default http://127.0.0.1:8000/chat)",
        "  COPILOT_TIMEOUT_MS    request timeout (default: none)",
        "  COPILOT_LENIENT_JSON  strip code fences and patch commas (default: 0)",
        "  RUST_LOG              log filter (default: info)",
    ]
    .join("\n")
}

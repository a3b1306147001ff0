// confronta CLI - structure IMSS contribution files and reconcile them

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use confronta_cli::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE, EXIT_VALIDATION};
use confronta_cli::ops::{self, Outcome};
use confronta_config::{LedgerLayout, Settings};
use confronta_io::{score_layout, LayoutScore};
use confronta_recon::Profile;

#[derive(Parser)]
#[command(name = "confronta")]
#[command(about = "Structure IMSS contribution ledgers and emissions, then reconcile them")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// Settings file (default: the user config directory)
    #[arg(long, global = true, value_name = "PATH", env = "CONFRONTA_CONFIG")]
    config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn raw sources into structured workbooks
    #[command(subcommand)]
    Structure(StructureCommands),

    /// Reconcile a structured declaration against a structured emission
    #[command(after_help = "\
Examples:
  confronta reconcile 03-2024_Y5412345105_CEDULA.xlsx 03-2024_Y5412345105_EMISION.xlsx
  confronta reconcile decl.xlsx emis.xlsx -o out/ --csv out/csv")]
    Reconcile {
        /// Structured declaration (MM-YYYY in the file name)
        declaration: PathBuf,

        /// Structured emission or viewer workbook
        emission: PathBuf,

        /// Output folder
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,

        /// Also export each sheet as CSV into this folder
        #[arg(long, value_name = "DIR")]
        csv: Option<PathBuf>,
    },

    /// Reconcile two structured declarations of the same period
    ReconcileDeclarations {
        left: PathBuf,
        right: PathBuf,

        /// Output folder
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Structure both sides as needed, then reconcile
    #[command(after_help = "\
Examples:
  confronta run ledger.SUA emision.xlsx -o out/
  confronta run ledgers/ emisiones/ -o out/
  confronta run ledgers/ visor/ -o out/")]
    Run {
        /// .SUA file, folder of .SUA files, or structured declaration
        declaration: PathBuf,

        /// Emission workbook, folder of workbooks, viewer export folder, or
        /// structured emission
        emission: PathBuf,

        /// Output folder
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Inspect ledger layouts
    #[command(subcommand)]
    Layout(LayoutCommands),
}

#[derive(Subcommand)]
enum StructureCommands {
    /// One .SUA ledger, or every ledger under a folder
    Ledger {
        source: PathBuf,
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },
    /// One emission workbook, or every workbook under a folder
    Emission {
        source: PathBuf,
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },
    /// An emission-viewer export folder
    Viewer {
        folder: PathBuf,
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum LayoutCommands {
    /// Decode sample ledgers with every configured layout
    #[command(after_help = "\
Reports, per file and layout, how many records decode. The layout with the
best ratio and no negative employer shares is the one to set in
[ledger] layout = \"...\".")]
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the configured layouts
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_settings(cli.config.as_deref()).and_then(|settings| dispatch(cli.command, &settings, cli.json));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("CONFRONTA_COMMIT"), ")",
        "\ntarget:  ", env!("CONFRONTA_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Settings::load_from(path).map_err(|e| {
            CliError::usage(e.to_string()).with_hint("fix the settings file or drop --config to use defaults")
        }),
        None => Ok(Settings::load()),
    }
}

fn dispatch(command: Commands, settings: &Settings, json: bool) -> Result<(), CliError> {
    match command {
        Commands::Structure(StructureCommands::Ledger { source, out }) => {
            report(ops::structure_declarations(&source, &out, settings), json)
        }
        Commands::Structure(StructureCommands::Emission { source, out }) => {
            report(ops::structure_emissions(&source, &out, settings), json)
        }
        Commands::Structure(StructureCommands::Viewer { folder, out }) => {
            report(ops::structure_viewer(&folder, &out, settings), json)
        }
        Commands::Reconcile { declaration, emission, out, csv } => report(
            ops::reconcile_with(&declaration, &emission, &out, Profile::DeclarationVsEmission, csv.as_deref(), settings),
            json,
        ),
        Commands::ReconcileDeclarations { left, right, out } => {
            report(ops::reconcile_declarations(&left, &right, &out, settings), json)
        }
        Commands::Run { declaration, emission, out } => report(ops::run(&declaration, &emission, &out, settings), json),
        Commands::Layout(LayoutCommands::Check { files }) => cmd_layout_check(&files, settings, json),
        Commands::Layout(LayoutCommands::Show) => cmd_layout_show(settings, json),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Outcomes
// ============================================================================

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{text}").map_err(|e| CliError::io(e.to_string()))
}

/// Print an outcome. Failures become a `CliError` carrying its exit code;
/// in JSON mode the failure is printed as JSON and the message is not
/// repeated on stderr.
fn report(outcome: Outcome, json: bool) -> Result<(), CliError> {
    if json {
        print_json(&outcome)?;
    } else {
        for skipped in &outcome.skipped {
            eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        if outcome.is_success() {
            println!("{}", outcome.message);
        }
    }
    if outcome.is_success() {
        return Ok(());
    }
    Err(CliError {
        code: outcome.exit_code,
        message: if json { String::new() } else { outcome.message },
        hint: None,
    })
}

// ============================================================================
// layout
// ============================================================================

#[derive(serde::Serialize)]
struct FileScores {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    scores: Vec<LayoutScore>,
}

fn cmd_layout_check(files: &[PathBuf], settings: &Settings, json: bool) -> Result<(), CliError> {
    let layouts = settings.ledger.layouts();
    let names = settings.names.pairs();
    let mut results = Vec::new();

    for file in files {
        let scored = std::fs::read(file)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                layouts
                    .iter()
                    .map(|layout| score_layout(&bytes, layout, &names))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())
            });
        match scored {
            Ok(scores) => results.push(FileScores { file: file.clone(), error: None, scores }),
            Err(e) => {
                log::warn!("{}: {e}", file.display());
                results.push(FileScores { file: file.clone(), error: Some(e), scores: Vec::new() });
            }
        }
    }

    if json {
        print_json(&results)?;
    } else {
        for r in &results {
            println!("{}", r.file.display());
            if let Some(e) = &r.error {
                println!("  error: {e}");
                continue;
            }
            for s in &r.scores {
                let active = if s.layout == settings.ledger.layout { " (active)" } else { "" };
                println!(
                    "  {:<12} {:>6}/{:<6} decoded {:>6.1}%  negative shares {}{}",
                    s.layout,
                    s.decoded,
                    s.records,
                    s.ratio() * 100.0,
                    s.negative_shares,
                    active
                );
            }
        }
    }

    if results.iter().all(|r| r.error.is_some()) {
        return Err(CliError {
            code: EXIT_VALIDATION,
            message: if json { String::new() } else { "no file could be read as a ledger".to_string() },
            hint: None,
        });
    }
    Ok(())
}

fn cmd_layout_show(settings: &Settings, json: bool) -> Result<(), CliError> {
    let layouts = settings.ledger.layouts();
    if json {
        return print_json(&serde_json::json!({
            "settings": settings.describe(),
            "active": settings.ledger.layout,
            "layouts": layouts,
        }));
    }
    println!("settings: {}", Settings::config_path().display());
    for layout in &layouts {
        print_layout(layout, layout.name == settings.ledger.layout);
    }
    Ok(())
}

fn print_layout(layout: &LedgerLayout, active: bool) {
    println!("{}{} (record length {})", layout.name, if active { " *" } else { "" }, layout.record_len);
    for (label, fields) in [("monthly", &layout.monthly), ("bimonthly", &layout.bimonthly)] {
        println!("  {label}:");
        for f in fields {
            let minus = f.minus.map(|m| format!(" - {m:?}")).unwrap_or_default();
            println!("    {:<16} {:>4}..{:<4} {:?}{}", format!("{:?}", f.field), f.start, f.end(), f.decode, minus);
        }
    }
}

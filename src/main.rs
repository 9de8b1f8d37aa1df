use clap::{Parser, Subcommand};
use royalbit_sheetmap::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetmap")]
#[command(about = "Look into spreadsheets the way the sheetmap engine sees them.")]
#[command(long_about = "Sheetmap - declarative spreadsheet <-> record mapping

Shows what the mapping engine sees in a workbook: sheets, used ranges,
merged regions, label lookups and the formatted text of cells.

COMMANDS:
  inspect  - Sheets, used ranges and merged regions
  find     - Locate a label with the configured matching modes
  cells    - Formatted text of a range

CONFIG:
  --config takes a YAML file with mapper settings, e.g.

    normalize_label_text: true
    regex_label_text: true

EXAMPLES:
  sheetmap inspect report.xlsx --verbose
  sheetmap find form.xlsx '/Total.*/' --config mapper.yaml
  sheetmap cells form.xlsx B2:F10 --sheet Summary --json

Logging: RUST_LOG=sheetmap=debug")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sheets with their used range and merged regions
    Inspect {
        /// Path to the workbook (.xlsx, .xls, .xlsb, .ods)
        file: PathBuf,

        /// Mapper config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// List every merged region and the effective config
        #[arg(short, long)]
        verbose: bool,
    },

    #[command(long_about = "Find every cell carrying a label.

Labels are compared the way the mapper compares them: exact by default,
whitespace-insensitive with normalize_label_text, and as a whole-text
regular expression when regex_label_text is set and the label is written
as /pattern/.

Exits with an error when no cell matches.")]
    /// Locate a label with the configured matching modes
    Find {
        /// Path to the workbook
        file: PathBuf,

        /// Label text, or /pattern/ with regex_label_text
        label: String,

        /// Only search this sheet
        #[arg(short, long)]
        sheet: Option<String>,

        /// Mapper config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the formatted text of a range
    Cells {
        /// Path to the workbook
        file: PathBuf,

        /// Range such as B2:F10, or a single cell
        range: String,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Mapper config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sheetmap=info,royalbit_sheetmap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            file,
            config,
            json,
            verbose,
        } => cli::inspect(file, config, json, verbose)?,

        Commands::Find {
            file,
            label,
            sheet,
            config,
            json,
        } => cli::find(file, label, sheet, config, json)?,

        Commands::Cells {
            file,
            range,
            sheet,
            config,
            json,
        } => cli::cells(file, range, sheet, config, json)?,
    }

    Ok(())
}

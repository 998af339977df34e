//! Purpose: `rema-export` CLI entry point.
//! Role: Binary crate root; parses args, installs logging, runs commands, emits JSON on stdout.
//! Invariants: `convert` prints exactly one JSON summary on stdout unless the document itself
//! goes to stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use rema_export::api::{DestinationFormat, Error, ErrorKind, LineEnding, to_exit_code};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "rema-export",
    version,
    about = "Convert retail transaction exports into spreadsheets or SQL scripts",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Reads one JSON export document and writes every table view of it.

Outputs:
  - `xlsx` workbook: Info, TopList, Transactions, Receipt Entries, Transactions Payments, Used Offers
  - `sql` script: CREATE TABLE plus one INSERT per row, with primary and foreign keys
"#,
    after_help = r#"EXAMPLES
  $ rema-export convert export.json -f xlsx             # writes export.xlsx
  $ rema-export convert export.json -o export.sql       # format from the extension
  $ cat export.json | rema-export convert - -f sql -o - # stdin to stdout

LEARN MORE
  $ rema-export <command> --help
  RUST_LOG=debug shows schema and sheet events on stderr."#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Xlsx,
    Sql,
}

impl From<FormatArg> for DestinationFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Xlsx => DestinationFormat::Xlsx,
            FormatArg::Sql => DestinationFormat::Sql,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LineEndingArg {
    Lf,
    Crlf,
}

impl From<LineEndingArg> for LineEnding {
    fn from(value: LineEndingArg) -> Self {
        match value {
            LineEndingArg::Lf => LineEnding::Lf,
            LineEndingArg::Crlf => LineEnding::CrLf,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Convert an export document",
        long_about = r#"Convert a JSON export document into a workbook or an SQL script.

The output format comes from --format, else from the output file extension.
Nothing is written unless the whole conversion succeeds."#,
        after_help = r#"EXAMPLES
  $ rema-export convert export.json -f sql
  $ rema-export convert export.json -o tables.sql --line-ending crlf
  $ rema-export convert export.json -f xlsx --header-row 2

NOTES
  - SOURCE `-` reads stdin; --output `-` writes the document to stdout
  - Without --output the document lands next to SOURCE with the format's extension
  - A JSON summary is printed on stdout unless the document itself goes there"#
    )]
    Convert(ConvertArgs),
    #[command(
        about = "Print version info as JSON",
        long_about = r#"Emit version info as JSON (stable, machine-readable)."#,
        after_help = r#"EXAMPLES
  $ rema-export version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout."#,
        after_help = r#"EXAMPLES
  $ rema-export completion bash > ~/.local/share/bash-completion/completions/rema-export
  $ rema-export completion zsh > ~/.zfunc/_rema-export
  $ rema-export completion fish > ~/.config/fish/completions/rema-export.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[arg(help = "Export document path (use - for stdin)", value_hint = ValueHint::FilePath)]
    source: String,
    #[arg(
        short = 'o',
        long,
        help = "Output path (use - for stdout)",
        value_hint = ValueHint::FilePath
    )]
    output: Option<String>,
    #[arg(short = 'f', long, value_enum, help = "Output format: xlsx|sql")]
    format: Option<FormatArg>,
    #[arg(
        long,
        value_enum,
        default_value = "lf",
        help = "SQL statement line ending: lf|crlf"
    )]
    line_ending: LineEndingArg,
    #[arg(long, default_value_t = 0, help = "Sheet row of the header line (0-based)")]
    header_row: u32,
    #[arg(long, help = "Sheet row of the first data line (default: header row + 1)")]
    data_row: Option<u32>,
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("rema-export {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "rema-export",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Parse => "invalid input document".to_string(),
        ErrorKind::ClosedWriter => "table writer is closed".to_string(),
        ErrorKind::SchemaFrozen => "table schema is frozen".to_string(),
        ErrorKind::UnknownHeader => "unknown header".to_string(),
        ErrorKind::UnsupportedType => "unsupported value type".to_string(),
        ErrorKind::NoActiveRow => "no active row".to_string(),
        ErrorKind::MissingDependency => "missing dependency".to_string(),
        ErrorKind::Workbook => "workbook error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the path, permissions, and disk space.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share the command if it persists.",
    )
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `rema-export --help`.".to_string();
    };
    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "rema-export") else {
        return "Try `rema-export --help`.".to_string();
    };

    let mut parts = vec!["rema-export"];
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }
    format!("Try `{} --help`.", parts.join(" "))
}

/// `-` selects the standard stream; anything else is a filesystem path.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Endpoint {
    Std,
    Path(PathBuf),
}

impl Endpoint {
    fn parse(value: &str) -> Self {
        if value == "-" {
            Endpoint::Std
        } else {
            Endpoint::Path(PathBuf::from(value))
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Endpoint::Std => None,
            Endpoint::Path(path) => Some(path),
        }
    }

    fn label(&self) -> String {
        match self {
            Endpoint::Std => "-".to_string(),
            Endpoint::Path(path) => path.display().to_string(),
        }
    }
}

/// Explicit flag first, then the output extension.
fn resolve_format(
    flag: Option<FormatArg>,
    output: Option<&Endpoint>,
) -> Result<DestinationFormat, Error> {
    if let Some(flag) = flag {
        return Ok(flag.into());
    }
    match output.and_then(Endpoint::path) {
        Some(path) => DestinationFormat::from_path(path).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("cannot infer output format from the output file extension")
                .with_hint("Use an .xlsx or .sql output path, or pass --format xlsx|sql.")
                .with_path(path)
        }),
        None => Err(Error::new(ErrorKind::Usage)
            .with_message("output format is required")
            .with_hint("Pass --format xlsx|sql, or an --output path ending in .xlsx or .sql.")),
    }
}

/// Explicit output, else the source path with the format's extension, else stdout.
fn resolve_output(
    source: &Endpoint,
    output: Option<Endpoint>,
    format: DestinationFormat,
) -> Endpoint {
    match (output, source) {
        (Some(output), _) => output,
        (None, Endpoint::Path(path)) => Endpoint::Path(path.with_extension(format.extension())),
        (None, Endpoint::Std) => Endpoint::Std,
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Endpoint, FormatArg, resolve_format, resolve_output};
    use clap::CommandFactory;
    use rema_export::api::{DestinationFormat, ErrorKind};
    use std::path::PathBuf;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_flag_wins_over_extension() {
        let output = Endpoint::parse("tables.xlsx");
        let format = resolve_format(Some(FormatArg::Sql), Some(&output)).expect("format");
        assert_eq!(format, DestinationFormat::Sql);
        let format = resolve_format(None, Some(&output)).expect("format");
        assert_eq!(format, DestinationFormat::Xlsx);
    }

    #[test]
    fn format_without_flag_or_extension_is_usage_error() {
        let err = resolve_format(None, Some(&Endpoint::parse("tables.txt"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = resolve_format(None, Some(&Endpoint::Std)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = resolve_format(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn default_output_swaps_the_source_extension() {
        let source = Endpoint::parse("data/export.json");
        assert_eq!(
            resolve_output(&source, None, DestinationFormat::Sql),
            Endpoint::Path(PathBuf::from("data/export.sql"))
        );
        assert_eq!(
            resolve_output(&Endpoint::Std, None, DestinationFormat::Sql),
            Endpoint::Std
        );
    }
}

//! Purpose: Hold top-level CLI command dispatch for `rema-export`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Output files are written only after the whole document rendered successfully.
//! Invariants: Errors carry the source or output path they relate to.

use std::fs;
use std::io::{Read, Write};

use rema_export::api::{
    DataRoot, ExportOptions, ExportSummary, SheetLayout, parse_document, read_document, render,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "rema-export", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Convert(args) => {
            tracing::debug!(source = %args.source, "convert");
            run_convert(args)
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<RunOutcome, Error> {
    let source = Endpoint::parse(&args.source);
    let requested_output = args.output.as_deref().map(Endpoint::parse);
    let format = resolve_format(args.format, requested_output.as_ref())?;
    let output = resolve_output(&source, requested_output, format);
    let options = ExportOptions {
        line_ending: args.line_ending.into(),
        layout: sheet_layout(args.header_row, args.data_row)?,
    };

    if let (Endpoint::Path(input), Endpoint::Path(target)) = (&source, &output) {
        if input == target {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("output would overwrite the source document")
                .with_hint("Pass a different --output path.")
                .with_path(target));
        }
    }

    let root = load_document(&source)?;
    let rendered = render(&root, format, &options)?;
    store_output(&output, &rendered.bytes)?;

    if output == Endpoint::Std {
        return Ok(RunOutcome::ok());
    }
    emit_json(converted_json(&source, &output, &rendered.summary));
    Ok(RunOutcome::ok())
}

fn sheet_layout(header_row: u32, data_row: Option<u32>) -> Result<SheetLayout, Error> {
    let data_row = match data_row {
        Some(row) => row,
        None => header_row.checked_add(1).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("--header-row leaves no room for data rows")
        })?,
    };
    if data_row <= header_row {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "--data-row {data_row} must come after --header-row {header_row}"
            ))
            .with_hint("Data rows start below the header row."));
    }
    Ok(SheetLayout {
        header_row,
        data_row,
    })
}

fn load_document(source: &Endpoint) -> Result<DataRoot, Error> {
    match source {
        Endpoint::Std => {
            let mut input = Vec::new();
            io::stdin().lock().read_to_end(&mut input).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            parse_document(&input)
        }
        Endpoint::Path(path) => {
            let file = fs::File::open(path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to open source document")
                    .with_path(path)
                    .with_source(err)
            })?;
            read_document(io::BufReader::new(file)).map_err(|err| err.with_path(path))
        }
    }
}

fn store_output(output: &Endpoint, bytes: &[u8]) -> Result<(), Error> {
    match output {
        Endpoint::Std => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|()| stdout.flush())
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write stdout")
                        .with_source(err)
                })
        }
        Endpoint::Path(path) => fs::write(path, bytes).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output document")
                .with_path(path)
                .with_source(err)
        }),
    }
}

fn converted_json(source: &Endpoint, output: &Endpoint, summary: &ExportSummary) -> Value {
    let generated_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    json!({
        "converted": {
            "source": source.label(),
            "output": output.label(),
            "format": summary.format,
            "generated_at": generated_at,
            "tables": summary.tables,
        }
    })
}

use clap::Parser;
use dbdesk::cli::{self, Cli, Command};
use dbdesk::config::{self, AppConfig};
use dbdesk::error::DbdeskError;
use dbdesk::format_detect::{self, TransferFormat};
use dbdesk::history::HISTORY_DISPLAY_LIMIT;
use dbdesk::query::{QueryExecutor, QueryOutcome};
use dbdesk::result::ResultSet;
use dbdesk::session::Session;
use dbdesk::transfer::{ChunkedTransfer, TransferReport};
use dbdesk::verbose::{Timer, Verbose};
use dbdesk::view::ResultView;
use dbdesk::{format, output};
use std::io::BufRead;
use std::process;

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // The engine is blocking; keep it off the runtime thread.
    let result = tokio::task::spawn_blocking(move || run(cli))
        .await
        .unwrap_or_else(|e| {
            Err(DbdeskError::Query {
                message: format!("task join error: {}", e),
            })
        });

    if let Err(err) = result {
        output::print_error(&err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DbdeskError> {
    let app_config = config::load(&cli)?;
    let verbose = Verbose(app_config.verbose);
    let mut session = Session::new();

    if let Command::Create(ref args) = cli.command {
        verbose.emit(&format!("creating {}...", args.path.display()));
        session.create(&args.path)?;
        output::print_result(&format!("created: {}\n", args.path.display()));
        return session.close();
    }

    let path = app_config.require_database()?;
    verbose.emit(&format!("opening {}...", path.display()));
    session.open(path)?;

    let result = dispatch(&cli.command, &app_config, &mut session, verbose);
    let closed = session.close();
    result.and(closed)
}

fn dispatch(
    command: &Command,
    app_config: &AppConfig,
    session: &mut Session,
    verbose: Verbose,
) -> Result<(), DbdeskError> {
    match command {
        Command::Create(_) => Ok(()),
        Command::Info => info(session),
        Command::Tables => {
            let tables = session.list_tables()?;
            output::print_result(&format::tables_to_toon(&tables)?);
            Ok(())
        }
        Command::Query(args) => {
            let sql = resolve_sql(args)?;
            let executor = QueryExecutor::new();
            let timer = Timer::start();
            let outcome = executor.execute(session, &sql)?;
            verbose.finished("query complete", &timer, outcome.result().map_or(0, ResultSet::len));
            print_outcome(&outcome)
        }
        Command::Shell => shell(session, verbose),
        Command::Import(args) => {
            let transfer = ChunkedTransfer::new(app_config.chunk_size)?.with_verbose(verbose);
            let conn = session.connection()?;
            let report = match format_detect::detect_import_format(&args.file)? {
                TransferFormat::Structured => transfer.import_structured(&args.file, conn)?,
                _ => transfer.import_delimited(&args.file, conn)?,
            };
            print_report(&report)
        }
        Command::Export(args) => {
            let transfer = ChunkedTransfer::new(app_config.chunk_size)?.with_verbose(verbose);
            let conn = session.connection()?;
            let (format, path) = format_detect::detect_format(&args.file)?;
            verbose.emit(&format!("writing {} to {}...", format.label(), path.display()));
            let report = match format {
                TransferFormat::Delimited => transfer.export_delimited(&args.table, &path, conn)?,
                TransferFormat::Structured => transfer.export_structured(&args.table, &path, conn)?,
                TransferFormat::Spreadsheet => transfer.export_spreadsheet(&args.table, &path, conn)?,
            };
            print_report(&report)
        }
        Command::Browse(args) => browse(args, app_config, session),
        Command::Backup => {
            let target = session.backup()?;
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| target.display().to_string());
            output::print_result(&format!("backup created: {}\n", name));
            Ok(())
        }
        Command::Compact => {
            let timer = Timer::start();
            session.compact()?;
            verbose.emit(&format!("compact complete ({}ms)", timer.elapsed_ms()));
            output::print_result("database compacted\n");
            Ok(())
        }
    }
}

// --- Helpers ---

fn resolve_sql(args: &cli::QueryArgs) -> Result<String, DbdeskError> {
    if let Some(ref sql) = args.sql {
        return Ok(sql.clone());
    }
    if let Some(ref path) = args.sql_file {
        let content = std::fs::read_to_string(path).map_err(|e| DbdeskError::Config {
            message: format!("cannot read SQL file {}: {}", path.display(), e),
        })?;
        return Ok(content);
    }
    Err(DbdeskError::Config {
        message: "no SQL provided; use positional argument or --file".to_string(),
    })
}

fn print_outcome(outcome: &QueryOutcome) -> Result<(), DbdeskError> {
    match outcome {
        QueryOutcome::Read {
            result,
            truncated,
            row_cap,
        } => {
            output::print_result(&format::to_toon(result)?);
            if *truncated {
                output::print_truncation_warning(&format!(
                    "result capped at {} rows; further rows were not fetched",
                    row_cap
                ));
            }
        }
        QueryOutcome::Write { affected_rows } => {
            let affected = affected_rows.to_string();
            output::print_result(&format!(
                "{}\n",
                format::to_toon_kv(&[("affected_rows", affected.as_str())])
            ));
        }
        QueryOutcome::Skipped => {}
    }
    Ok(())
}

fn print_report(report: &TransferReport) -> Result<(), DbdeskError> {
    if report.truncated {
        output::print_truncation_warning(&report.message());
    }
    output::print_summary(report)
}

fn info(session: &Session) -> Result<(), DbdeskError> {
    let path = session
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let size = output::format_size(session.file_size()?);
    let tables = session.table_names()?.len().to_string();
    output::print_result(&format!(
        "{}\n",
        format::to_toon_kv(&[
            ("path", path.as_str()),
            ("size", size.as_str()),
            ("tables", tables.as_str()),
        ])
    ));
    Ok(())
}

fn browse(
    args: &cli::BrowseArgs,
    app_config: &AppConfig,
    session: &Session,
) -> Result<(), DbdeskError> {
    let mut view = ResultView::new();
    if let Some(ref filter) = args.filter {
        view.set_filter(filter);
    }
    view.load(session.connection()?, &args.table, app_config.view_limit)?;

    let visible = ResultSet {
        columns: view.columns().to_vec(),
        rows: view.visible_rows().cloned().collect(),
    };
    output::print_result(&format::to_toon(&visible)?);
    eprintln!("{}", view.summary());
    Ok(())
}

/// Line-oriented statement loop. Failed statements are reported and the loop
/// continues.
fn shell(session: &mut Session, verbose: Verbose) -> Result<(), DbdeskError> {
    let executor = QueryExecutor::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            ".quit" | ".exit" => break,
            ".tables" => {
                output::print_result(&format::tables_to_toon(&session.list_tables()?)?);
            }
            ".history" => {
                for entry in session.history().recent(HISTORY_DISPLAY_LIMIT) {
                    output::print_result(&format!("[{}] {}\n", entry.time_label(), entry.query));
                }
            }
            _ => {
                let timer = Timer::start();
                match executor.execute(session, &line) {
                    Ok(outcome) => {
                        verbose.finished(
                            "statement complete",
                            &timer,
                            outcome.result().map_or(0, ResultSet::len),
                        );
                        print_outcome(&outcome)?;
                    }
                    Err(err) => output::print_error(&err),
                }
            }
        }
    }
    Ok(())
}

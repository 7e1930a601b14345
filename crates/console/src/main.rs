//! `kiss-console` -- terminal front-end for the KISS import.
//!
//! Loads the staged import of one job from the shop API, lets the operator
//! review and edit dispositions and label counts, and commits the import
//! while printing the server's progress.
//!
//! See [`kiss_console::config::ConsoleConfig::from_env`] for the
//! environment variables it reads.

use kiss_client::api::HttpShopApi;
use kiss_client::commit::CommitOutcome;
use kiss_client::prompt::Prompter;
use kiss_client::session::{ImportOutcome, ImportSession};
use kiss_console::commands::{self, Command, HELP};
use kiss_console::config::ConsoleConfig;
use kiss_console::terminal::{Terminal, TerminalPrompter};
use kiss_core::commit_flow::FocusField;
use kiss_core::filters::FilterField;
use kiss_core::preferences::DiscardSetting;
use kiss_core::record_set::LabelEdit;
use kiss_core::status::color_bucket;
use tokio::io::{AsyncBufRead, AsyncWrite};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiss_console=info,kiss_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConsoleConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("{e}");
        std::process::exit(1);
    });

    tracing::info!(
        job_id = config.job_id,
        api_url = %config.api_url,
        keep_minors = config.keep_minors,
        "Starting kiss-console",
    );

    let api = HttpShopApi::new(config.api_url.clone(), config.auth_token.clone());

    let mut session =
        match ImportSession::load(&api, config.job_id, config.keep_minors, config.auth_token.clone())
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(job_id = config.job_id, error = %e, "Failed to load staged import");
                std::process::exit(1);
            }
        };
    session.records_mut().toggle_hide_ignored(config.hide_ignored);

    let mut progress = session.subscribe_progress();
    let progress_printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let text = progress.borrow_and_update().clone();
            if !text.is_empty() {
                eprintln!("  .. {text}");
            }
        }
    });

    let terminal = Terminal::stdio();
    let prompter = TerminalPrompter::new(&terminal);

    terminal.write_line(HELP).await;
    print_rows(&terminal, &session).await;

    while let Some(line) = terminal.read_line("kiss> ").await {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                terminal.write_line(&e.to_string()).await;
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        if !run_command(command, &mut session, &api, &prompter, &terminal, &config).await {
            break;
        }
    }

    progress_printer.abort();
    tracing::info!(job_id = config.job_id, "kiss-console stopped");
}

/// Execute one command. Returns `false` once the session is over.
async fn run_command<R, W>(
    command: Command,
    session: &mut ImportSession,
    api: &HttpShopApi,
    prompter: &dyn Prompter,
    terminal: &Terminal<R, W>,
    config: &ConsoleConfig,
) -> bool
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match command {
        Command::List => print_rows(terminal, session).await,
        Command::Labels {
            unique_number,
            labels_needed,
        } => match session
            .edit_labels_needed(prompter, unique_number, labels_needed)
            .await
        {
            Ok(LabelEdit::Accepted(a)) => {
                terminal
                    .write_line(&format!(
                        "{unique_number}: {} marks/label, {} on full labels, {} on the partial label",
                        a.per_label_marks, a.marks_on_full_barcodes, a.marks_on_partial_label
                    ))
                    .await
            }
            Ok(LabelEdit::Rejected(_)) => {}
            Err(e) => terminal.write_line(&e.to_string()).await,
        },
        Command::Status {
            unique_number,
            status,
        } => {
            if let Err(e) = session.records_mut().set_status(unique_number, status) {
                terminal.write_line(&e.to_string()).await;
            }
        }
        Command::Select(ids) => {
            for id in ids {
                if let Err(e) = session.records_mut().select(id) {
                    terminal.write_line(&e.to_string()).await;
                }
            }
        }
        Command::SelectAll => session.records_mut().select_all(),
        Command::ClearSelection => session.records_mut().clear_selection(),
        Command::Bulk(status) => {
            let changed = session.records_mut().bulk_set_selected_status(status);
            terminal
                .write_line(&format!("{changed} rows set to {status}"))
                .await;
        }
        Command::Hide(on) => {
            session.records_mut().toggle_hide_ignored(on);
            print_rows(terminal, session).await;
        }
        Command::Filter { field, value } => session.preferences_mut().set_filter(field, value),
        Command::Route {
            route_code_id,
            route_code,
        } => session.preferences_mut().set_route(route_code_id, route_code),
        Command::ClearRoute => session.preferences_mut().clear_route(),
        Command::Minors(on) => session.preferences_mut().keep_minors = on,
        Command::Discard { shape, setting } => {
            if let Err(e) = session.set_discard_setting(&shape, setting) {
                terminal.write_line(&e.to_string()).await;
            }
        }
        Command::Settings => print_settings(terminal, session).await,
        Command::Import => return run_import(session, api, prompter, terminal, config).await,
        Command::Help => terminal.write_line(HELP).await,
        Command::Quit => return false,
    }
    true
}

async fn run_import<R, W>(
    session: &mut ImportSession,
    api: &HttpShopApi,
    prompter: &dyn Prompter,
    terminal: &Terminal<R, W>,
    config: &ConsoleConfig,
) -> bool
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let outcome = match session.import(api, prompter, &config.commit).await {
        Ok(outcome) => outcome,
        Err(e) => {
            terminal.write_line(&e.to_string()).await;
            return true;
        }
    };

    match outcome {
        ImportOutcome::Aborted(reason) => {
            terminal.write_line("Import cancelled.").await;
            if reason.focus() == Some(FocusField::RouteCode) {
                terminal
                    .write_line("Choose a routing code with 'route <id> <code>', then run import again.")
                    .await;
            }
            true
        }
        ImportOutcome::SettingsFailed { operation } => {
            terminal
                .write_line(&format!("Import stopped: could not {operation}."))
                .await;
            true
        }
        ImportOutcome::Commit(CommitOutcome::Completed {
            deletion_review: Some(hand_off),
        }) => {
            terminal
                .write_line(&format!(
                    "Deletion report {} for job {} is ready for review.",
                    hand_off.report_id, hand_off.job_id
                ))
                .await;
            false
        }
        ImportOutcome::Commit(CommitOutcome::FiltersRejected(_)) => {
            terminal
                .write_line("Correct the cleared filters, then run import again.")
                .await;
            true
        }
        ImportOutcome::Commit(CommitOutcome::ConflictRetry) => {
            terminal
                .write_line("Sequence filter cleared. Run import again to retry.")
                .await;
            true
        }
        ImportOutcome::Commit(outcome) => !outcome.ends_session(),
    }
}

async fn print_settings<R, W>(terminal: &Terminal<R, W>, session: &ImportSession)
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let preferences = session.preferences();
    let route = match (preferences.route_code_id, preferences.route_code.as_deref()) {
        (Some(id), code) => format!("{} ({id})", code.unwrap_or("-")),
        (None, _) => "none".to_string(),
    };
    let mut out = format!(
        "Routing code: {route}\nKeep minors: {}{}\n",
        preferences.keep_minors,
        if preferences.keep_minors_dirty() { " (not saved)" } else { "" },
    );
    for field in FilterField::ALL {
        out.push_str(&format!("{}: {}\n", field.as_str(), preferences.filter(field)));
    }
    for discard in session.discard_types() {
        let setting = match discard.setting() {
            DiscardSetting::Imported => "imported",
            DiscardSetting::Excluded => "excluded",
            DiscardSetting::Summarized => "summarized",
        };
        out.push_str(&format!("Discard {}: {setting}\n", discard.shape));
    }
    terminal.write_line(out.trim_end()).await;
}

async fn print_rows<R, W>(terminal: &Terminal<R, W>, session: &ImportSession)
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let records = session.records();
    let mut out = format!(
        "{:>8}  {:<14} {:>5} {:>6} {:>5} {:>6} {:>5}  {:<22} {}\n",
        "Unique", "Piecemark", "Qty", "Labels", "PLM", "MOFB", "MOPL", "Status", "Bucket"
    );
    for row in records.rows() {
        let selected = if records.selection().contains(&row.unique_number) { "*" } else { " " };
        out.push_str(&format!(
            "{selected}{:>7}  {:<14} {:>5} {:>6} {:>5} {:>6} {:>5}  {:<22} {:?}\n",
            row.unique_number,
            row.piecemark,
            row.import_quantity,
            row.labels_needed,
            row.per_label_marks,
            row.marks_on_full_barcodes,
            row.marks_on_partial_label,
            row.status.as_str(),
            color_bucket(row),
        ));
    }
    let counts = records.bucket_counts();
    out.push_str(&format!(
        "{} rows ({} hidden): {} green, {} yellow, {} gray, {} blue",
        counts.total(),
        records.hidden().len(),
        counts.green,
        counts.yellow,
        counts.gray,
        counts.blue
    ));
    terminal.write_line(&out).await;
}

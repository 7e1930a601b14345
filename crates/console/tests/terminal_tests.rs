//! Tests for the terminal prompter, driven through in-memory input and
//! output instead of stdin/stdout.

use kiss_client::prompt::{Notice, Prompter, Question};
use kiss_console::terminal::{parse_answer, Terminal, TerminalPrompter};
use kiss_core::commit_flow::{Prompt, Response};

fn terminal(input: &'static str) -> Terminal<&'static [u8], Vec<u8>> {
    Terminal::new(input.as_bytes(), Vec::new())
}

fn output(terminal: Terminal<&'static [u8], Vec<u8>>) -> String {
    String::from_utf8(terminal.into_output()).unwrap()
}

// ---------------------------------------------------------------------------
// Test: answers map onto responses
// ---------------------------------------------------------------------------

#[test]
fn answers_are_case_insensitive() {
    assert_eq!(parse_answer("Y"), Some(Response::Accept));
    assert_eq!(parse_answer(" no "), Some(Response::Reject));
    assert_eq!(parse_answer("cancel"), Some(Response::Dismiss));
    assert_eq!(parse_answer("later"), None);
}

// ---------------------------------------------------------------------------
// Test: confirm shows the question and re-asks on unclear answers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn confirm_reasks_until_answered() {
    let terminal = terminal("maybe\nn\n");
    let prompter = TerminalPrompter::new(&terminal);

    let response = prompter
        .confirm(Question::Settings(Prompt::ProceedWithoutRouteCode))
        .await;

    assert_eq!(response, Response::Reject);
    let shown = output(terminal);
    assert_eq!(shown.matches(Prompt::ProceedWithoutRouteCode.message()).count(), 2);
}

// ---------------------------------------------------------------------------
// Test: end of input dismisses the question
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_of_input_dismisses() {
    let terminal = terminal("");
    let prompter = TerminalPrompter::new(&terminal);

    assert_eq!(prompter.confirm(Question::ReviewDeletions).await, Response::Dismiss);
}

// ---------------------------------------------------------------------------
// Test: notices are written with their level
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notice_is_written() {
    let terminal = terminal("");
    {
        let prompter = TerminalPrompter::new(&terminal);
        prompter
            .notify(Notice::warning("Filters cleared", "PieceMarks"))
            .await;
    }

    assert_eq!(output(terminal), "[warning] Filters cleared: PieceMarks\n");
}

// ---------------------------------------------------------------------------
// Test: the command loop and the prompter share one input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lines_are_shared_between_readers() {
    let terminal = terminal("import\ny\nquit\n");

    assert_eq!(terminal.read_line("kiss> ").await.as_deref(), Some("import"));
    let prompter = TerminalPrompter::new(&terminal);
    assert_eq!(prompter.confirm(Question::AbortAfterConflict).await, Response::Accept);
    assert_eq!(terminal.read_line("kiss> ").await.as_deref(), Some("quit"));
    assert_eq!(terminal.read_line("kiss> ").await, None);
}

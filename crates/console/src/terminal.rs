//! Line-oriented terminal I/O and the terminal [`Prompter`].

use async_trait::async_trait;
use kiss_client::prompt::{Notice, NoticeLevel, Prompter, Question};
use kiss_core::commit_flow::Response;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;

/// Shared input and output of the console.
///
/// The command loop and the prompter read from the same input, so both go
/// through this type.
pub struct Terminal<R, W> {
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
}

impl Terminal<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
            output: Mutex::new(writer),
        }
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        self.write(prompt).await;
        match self.input.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read input");
                None
            }
        }
    }

    pub async fn write_line(&self, text: &str) {
        self.write(&format!("{text}\n")).await;
    }

    async fn write(&self, text: &str) {
        let mut output = self.output.lock().await;
        let result = async {
            output.write_all(text.as_bytes()).await?;
            output.flush().await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to write output");
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }
}

/// Asks questions and shows notices on a [`Terminal`].
pub struct TerminalPrompter<'a, R, W> {
    terminal: &'a Terminal<R, W>,
}

impl<'a, R, W> TerminalPrompter<'a, R, W> {
    pub fn new(terminal: &'a Terminal<R, W>) -> Self {
        Self { terminal }
    }
}

/// Interpret an answer. `None` asks again.
pub fn parse_answer(answer: &str) -> Option<Response> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Response::Accept),
        "n" | "no" => Some(Response::Reject),
        "c" | "cancel" => Some(Response::Dismiss),
        _ => None,
    }
}

#[async_trait]
impl<'a, R, W> Prompter for TerminalPrompter<'a, R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, question: Question) -> Response {
        let prompt = format!("{} [y]es / [n]o / [c]ancel: ", question.message());
        loop {
            let Some(answer) = self.terminal.read_line(&prompt).await else {
                return Response::Dismiss;
            };
            if let Some(response) = parse_answer(&answer) {
                return response;
            }
        }
    }

    async fn notify(&self, notice: Notice) {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        self.terminal
            .write_line(&format!("[{level}] {}: {}", notice.title, notice.detail))
            .await;
    }
}

//! Scripted in-memory shell for tests.
//!
//! Behaves like a bench machine's bash that can launch the ONOS console:
//! it echoes what is typed, prints `$` and `onos>` prompts, and lets the
//! test decide what every console command answers. Console output uses
//! Karaf's `\r\r\n` line endings.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::Transport;
use crate::error::{Result, TransportError};

pub(crate) const OUTER_PROMPT: &str = "sdn@bench:~/onos$ ";
pub(crate) const INNER_PROMPT: &str = "onos> ";

const CONSOLE_EOL: &str = "\r\r\n";

/// What the console does with a command line.
pub(crate) enum Reply {
    /// Print the text, then the console prompt.
    Output(String),
    /// Print nothing after the echo; the prompt never comes back.
    Silent,
    /// Print the text and fall back to the bash prompt.
    DropToShell(String),
    /// Print the text and the prompt only after a delay. Input typed in
    /// the meantime is handled once the output is out.
    Late(Duration, String),
    /// Print the text in separate reads, then the console prompt.
    Chunks(Vec<String>),
    /// The console stops answering for good.
    Hang,
}

type Handler = Box<dyn FnMut(&str) -> Reply + Send>;

struct ShellState {
    pending: VecDeque<Vec<u8>>,
    typed: String,
    in_console: bool,
    starting: bool,
    start_failures: u32,
    closed: bool,
    hung: bool,
    late: Option<(Instant, String)>,
    queued: Vec<u8>,
    sent: Vec<String>,
    handler: Handler,
}

impl ShellState {
    fn push(&mut self, text: String) {
        self.pending.push_back(text.into_bytes());
    }

    fn outer(&mut self, line: &str) {
        if self.starting {
            // A hung `onos -w` swallows input until interrupted
            return;
        }
        let echo = format!("{}\r\n", line);
        if line.is_empty() {
            self.push(format!("\r\n{}", OUTER_PROMPT));
        } else if line.starts_with("onos -w") || line == "onos" {
            if self.start_failures > 0 {
                self.start_failures -= 1;
                self.starting = true;
                self.push(echo);
            } else {
                self.in_console = true;
                self.push(format!(
                    "{}Welcome to Open Network Operating System (ONOS)!{}{}",
                    echo, CONSOLE_EOL, INNER_PROMPT
                ));
            }
        } else if let Some(text) = line.strip_prefix("echo ") {
            self.push(format!("{}{}\r\n{}", echo, text, OUTER_PROMPT));
        } else if line == "exit" {
            self.closed = true;
            self.push(format!("{}logout\r\nConnection to bench closed.\r\n", echo));
        } else if line.starts_with("cd ") {
            self.push(format!("{}{}", echo, OUTER_PROMPT));
        } else {
            let program = line.split_whitespace().next().unwrap_or_default().to_string();
            self.push(format!(
                "{}bash: {}: command not found\r\n{}",
                echo, program, OUTER_PROMPT
            ));
        }
    }

    fn inner(&mut self, line: &str) {
        let echo = format!("{}{}", line, CONSOLE_EOL);
        if line.is_empty() {
            self.push(format!("{}{}", CONSOLE_EOL, INNER_PROMPT));
            return;
        }
        if line == "logout" {
            self.in_console = false;
            self.push(format!("{}{}", echo, OUTER_PROMPT));
            return;
        }
        if let Some(text) = line.strip_prefix("echo ") {
            self.push(format!("{}{}{}{}", echo, text, CONSOLE_EOL, INNER_PROMPT));
            return;
        }
        if line.starts_with("config:property-set") {
            self.in_console = false;
            self.push(format!("{}Connection closed by foreign host.\r\n{}", echo, OUTER_PROMPT));
            return;
        }
        match (self.handler)(line) {
            Reply::Output(body) => {
                let body = body.replace('\n', CONSOLE_EOL);
                if body.is_empty() {
                    self.push(format!("{}{}", echo, INNER_PROMPT));
                } else {
                    self.push(format!("{}{}{}{}", echo, body, CONSOLE_EOL, INNER_PROMPT));
                }
            }
            Reply::Silent => self.push(echo),
            Reply::DropToShell(body) => {
                self.in_console = false;
                self.push(format!("{}{}\r\n{}", echo, body, OUTER_PROMPT));
            }
            Reply::Late(delay, body) => {
                self.push(echo);
                let body = body.replace('\n', CONSOLE_EOL);
                self.late = Some((
                    Instant::now() + delay,
                    format!("{}{}{}", body, CONSOLE_EOL, INNER_PROMPT),
                ));
            }
            Reply::Chunks(parts) => {
                self.push(echo);
                for part in parts {
                    self.push(part);
                }
                self.push(format!("{}{}", CONSOLE_EOL, INNER_PROMPT));
            }
            Reply::Hang => {
                self.push(echo);
                self.hung = true;
            }
        }
    }

    /// Hand out delayed output, then handle what was typed meanwhile.
    fn deliver_late(&mut self) {
        if let Some((_, text)) = self.late.take() {
            self.push(text);
            let queued = std::mem::take(&mut self.queued);
            self.feed(&queued);
        }
    }

    fn interrupt(&mut self) {
        self.sent.push("\x03".to_string());
        if self.hung {
            return;
        }
        if self.starting {
            self.starting = false;
            self.push(format!("^C\r\n{}", OUTER_PROMPT));
        } else if self.in_console {
            self.push(format!("{}{}", CONSOLE_EOL, INNER_PROMPT));
        } else {
            self.push(format!("^C\r\n{}", OUTER_PROMPT));
        }
    }

    fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            if self.late.is_some() {
                self.queued.push(byte);
                continue;
            }
            match byte {
                0x03 => {
                    self.typed.clear();
                    self.interrupt();
                }
                b'\n' => {
                    let line = std::mem::take(&mut self.typed);
                    let line = line.trim_end_matches('\r').to_string();
                    self.sent.push(line.clone());
                    if self.hung {
                        continue;
                    }
                    if self.in_console {
                        self.inner(&line);
                    } else {
                        self.outer(&line);
                    }
                }
                other => self.typed.push(other as char),
            }
        }
    }
}

/// The fake shell, handed to the driver as its transport.
pub(crate) struct FakeShell {
    state: Arc<Mutex<ShellState>>,
}

/// Read-only view of what was typed into a [`FakeShell`].
#[derive(Clone)]
pub(crate) struct ShellLog {
    state: Arc<Mutex<ShellState>>,
}

fn lock(state: &Arc<Mutex<ShellState>>) -> MutexGuard<'_, ShellState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl FakeShell {
    /// A shell at the bash prompt whose console answers through `handler`.
    pub(crate) fn new(handler: impl FnMut(&str) -> Reply + Send + 'static) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(format!("Last login: Mon Oct 19 09:12:01 2026\r\n{}", OUTER_PROMPT).into_bytes());
        Self {
            state: Arc::new(Mutex::new(ShellState {
                pending,
                typed: String::new(),
                in_console: false,
                starting: false,
                start_failures: 0,
                closed: false,
                hung: false,
                late: None,
                queued: Vec::new(),
                sent: Vec::new(),
                handler: Box::new(handler),
            })),
        }
    }

    /// Make the next `n` console launches hang until interrupted.
    pub(crate) fn failing_starts(self, n: u32) -> Self {
        lock(&self.state).start_failures = n;
        self
    }

    pub(crate) fn log(&self) -> ShellLog {
        ShellLog {
            state: self.state.clone(),
        }
    }
}

impl ShellLog {
    /// Every line typed, in order. Interrupts show up as `"\x03"`.
    pub(crate) fn lines(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    /// Lines typed that start with `prefix`.
    pub(crate) fn matching(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }

    pub(crate) fn clear(&self) {
        lock(&self.state).sent.clear();
    }

    pub(crate) fn in_console(&self) -> bool {
        lock(&self.state).in_console
    }
}

impl Transport for FakeShell {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Disconnected.into());
        }
        state.feed(data);
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let wake = {
                let mut state = lock(&self.state);
                if let Some(chunk) = state.pending.pop_front() {
                    return Ok(Some(chunk));
                }
                if state.closed {
                    return Ok(None);
                }
                state.late.as_ref().map(|(at, _)| *at)
            };
            match wake {
                Some(at) => {
                    tokio::time::sleep_until(at).await;
                    lock(&self.state).deliver_late();
                }
                // Nothing more is coming; let the caller's timeout fire
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn close(self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

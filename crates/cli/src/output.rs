//! Chat line output on stdout.

use std::io::Write;

use {
    async_trait::async_trait,
    chatwatch_capture::{ChatMessage, Error, EventSink, Result},
    clap::ValueEnum,
    tokio::sync::Mutex,
};

/// How captured messages are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `Sender: text`, or `UserID <id>: text` for legacy markup.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl OutputFormat {
    pub fn render(self, message: &ChatMessage) -> serde_json::Result<String> {
        match self {
            Self::Text => Ok(message.to_string()),
            Self::Json => serde_json::to_string(message),
        }
    }
}

/// Writes one line per message and flushes immediately so consumers see
/// chat as it arrives.
pub struct LineSink {
    format: OutputFormat,
    out: Mutex<Box<dyn Write + Send>>,
}

impl LineSink {
    pub fn new(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            out: Mutex::new(out),
        }
    }

    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, Box::new(std::io::stdout()))
    }
}

#[async_trait]
impl EventSink for LineSink {
    async fn accept(&self, message: ChatMessage) -> Result<()> {
        let line = self.format.render(&message).map_err(Error::sink)?;
        let mut out = self.out.lock().await;
        writeln!(out, "{line}").map_err(Error::sink)?;
        out.flush().map_err(Error::sink)
    }
}

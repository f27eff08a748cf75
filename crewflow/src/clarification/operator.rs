//! The operator boundary: one line of free text per question.

use crate::errors::OperatorError;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

/// Answers clarification questions.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Asks one question. `Ok(None)` means end of input.
    async fn ask(&self, question: &str) -> Result<Option<String>, OperatorError>;
}

/// An operator reading answers line by line from an async reader and
/// writing questions to an async writer.
#[derive(Debug)]
pub struct LineOperator<R, W> {
    io: Mutex<(R, W)>,
}

/// The interactive terminal operator.
pub type StdinOperator = LineOperator<BufReader<Stdin>, Stderr>;

impl StdinOperator {
    /// Reads answers from stdin and prints questions to stderr.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> LineOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates an operator over the given reader and writer.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

#[async_trait]
impl<R, W> Operator for LineOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&self, question: &str) -> Result<Option<String>, OperatorError> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;

        writer.write_all(format!("{question}\n> ").as_bytes()).await?;
        writer.flush().await?;

        let mut line = Vec::new();
        let read = reader.read_until(b'\n', &mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        let answer = match String::from_utf8(line) {
            Ok(text) => text,
            Err(e) => {
                warn!(question, "Answer is not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(Some(answer.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_one_line_per_question() {
        let input: &[u8] = b"Admins only\r\nCSV\n";
        let operator = LineOperator::new(input, Vec::new());

        assert_eq!(operator.ask("Who?").await.unwrap(), Some("Admins only".to_string()));
        assert_eq!(operator.ask("Format?").await.unwrap(), Some("CSV".to_string()));
        assert_eq!(operator.ask("More?").await.unwrap(), None);

        let (_, written) = operator.io.into_inner();
        assert_eq!(String::from_utf8(written).unwrap(), "Who?\n> Format?\n> More?\n> ");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let input: &[u8] = b"\xff\xfeCSV\nAdmins\n";
        let operator = LineOperator::new(input, tokio::io::sink());

        assert_eq!(operator.ask("Format?").await.unwrap(), Some("\u{fffd}\u{fffd}CSV".to_string()));
        assert_eq!(operator.ask("Who?").await.unwrap(), Some("Admins".to_string()));
    }

    #[tokio::test]
    async fn test_blank_line_is_empty_answer() {
        let input: &[u8] = b"\n";
        let operator = LineOperator::new(input, tokio::io::sink());
        assert_eq!(operator.ask("Who?").await.unwrap(), Some(String::new()));
    }
}

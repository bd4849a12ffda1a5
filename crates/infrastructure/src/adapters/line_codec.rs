use std::pin::Pin;

use domain::InstrumentError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Line-oriented framing shared by the stream adapters.
///
/// Writes append the write terminator, reads collect bytes up to the read
/// terminator and return the text without it (surrounding CR/LF trimmed).
///
/// `read_line` is cancel safe: bytes of a line that was still incomplete when
/// the future was dropped stay in `partial` and are completed by the next call.
pub struct LineCodec<S> {
    stream: BufReader<S>,
    write_termination: String,
    read_termination: u8,
    partial: Vec<u8>,
}

impl<S> LineCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, write_termination: &str, read_termination: u8) -> Self {
        Self {
            stream: BufReader::new(stream),
            write_termination: write_termination.to_string(),
            read_termination,
            partial: Vec::with_capacity(64),
        }
    }

    pub async fn write_line(&mut self, command: &str) -> Result<(), InstrumentError> {
        let line = format!("{}{}", command, self.write_termination);
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| InstrumentError::Transport(format!("Write error: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| InstrumentError::Transport(format!("Flush error: {}", e)))
    }

    pub async fn read_line(&mut self) -> Result<String, InstrumentError> {
        let n = self
            .stream
            .read_until(self.read_termination, &mut self.partial)
            .await
            .map_err(|e| InstrumentError::Transport(format!("Read error: {}", e)))?;
        if n == 0 && self.partial.is_empty() {
            return Err(InstrumentError::Transport(
                "Connection closed by instrument".to_string(),
            ));
        }
        let mut buffer = std::mem::take(&mut self.partial);
        if buffer.last() == Some(&self.read_termination) {
            buffer.pop();
        }
        Ok(String::from_utf8_lossy(&buffer)
            .trim_matches(['\r', '\n'])
            .to_string())
    }

    /// Drop the incomplete line and whatever the reader has buffered so far.
    /// Returns the number of bytes discarded.
    pub fn discard_buffered(&mut self) -> usize {
        let buffered = self.stream.buffer().len();
        Pin::new(&mut self.stream).consume(buffered);
        let discarded = buffered + self.partial.len();
        self.partial.clear();
        discarded
    }

    /// The underlying stream, bypassing the read buffer
    pub fn stream_mut(&mut self) -> &mut S {
        self.stream.get_mut()
    }

    pub async fn shutdown(&mut self) -> Result<(), InstrumentError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| InstrumentError::Transport(format!("Shutdown error: {}", e)))
    }
}

/// First byte of a configured terminator; only ASCII terminators are supported
pub fn termination_byte(termination: &str) -> Result<u8, InstrumentError> {
    match termination.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(InstrumentError::Configuration(format!(
            "Read termination must be a single ASCII character, got {:?}",
            termination
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_write_appends_terminator() {
        let mock = Builder::new().write(b":VOLT 42.5V\n").build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');
        codec.write_line(":VOLT 42.5V").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_strips_terminators() {
        let mock = Builder::new().read(b"42.50 V\r\n").build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');
        assert_eq!(codec.read_line().await.unwrap(), "42.50 V");
    }

    #[tokio::test]
    async fn test_read_reassembles_fragments() {
        let mock = Builder::new().read(b"0,\"No ").read(b"error\"\n").build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');
        assert_eq!(codec.read_line().await.unwrap(), "0,\"No error\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_resumes_after_cancellation() {
        let mock = Builder::new()
            .read(b"1")
            .wait(Duration::from_millis(200))
            .read(b"23\n")
            .build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');

        let first = tokio::time::timeout(Duration::from_millis(100), codec.read_line()).await;
        assert!(first.is_err());
        assert_eq!(codec.read_line().await.unwrap(), "123");
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_partial_line() {
        let mock = Builder::new()
            .read(b"42.")
            .wait(Duration::from_millis(200))
            .read(b"5 V\n7 A\n")
            .build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');

        let first = tokio::time::timeout(Duration::from_millis(100), codec.read_line()).await;
        assert!(first.is_err());
        assert_eq!(codec.discard_buffered(), 3);
        assert_eq!(codec.read_line().await.unwrap(), "5 V");
        assert_eq!(codec.read_line().await.unwrap(), "7 A");
    }

    #[tokio::test]
    async fn test_eof_is_transport_error() {
        let mock = Builder::new().build();
        let mut codec = LineCodec::new(mock, "\n", b'\n');
        assert!(matches!(
            codec.read_line().await,
            Err(InstrumentError::Transport(_))
        ));
    }

    #[test]
    fn test_termination_byte() {
        assert_eq!(termination_byte("\n").unwrap(), b'\n');
        assert!(termination_byte("\r\n").is_err());
        assert!(termination_byte("").is_err());
    }
}

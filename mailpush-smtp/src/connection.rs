use core::fmt::Display;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::ConnectionResult;

/// A line-oriented view of a client stream.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    stream: BufReader<Stream>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Connection<Stream> {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Write `response` followed by CRLF and flush.
    pub(crate) async fn send<S: Display + Send + Sync>(
        &mut self,
        response: &S,
    ) -> ConnectionResult<usize> {
        let line = format!("{response}\r\n");

        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;

        Ok(line.len())
    }

    /// Read up to and including the next `\n`, or at most `limit` bytes.
    ///
    /// A returned chunk without a trailing `\n` is the start of an over-long
    /// line; the rest arrives on the following calls. `None` means the peer
    /// closed the stream.
    pub(crate) async fn receive_line(&mut self, limit: usize) -> ConnectionResult<Option<Vec<u8>>> {
        let mut line = Vec::new();

        let read = (&mut self.stream)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;

        Ok((read > 0).then_some(line))
    }
}

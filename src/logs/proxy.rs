//! # Server log ingestion.
//!
//! A [`LogProxy`] owns one background task that reads a server's stdout and
//! stderr line by line, decodes each line as a [`LogRecord`] and re-emits it
//! inside the server's `tracing` span.
//!
//! ```text
//! child stdout ─► FramedRead<BytesCodec> ─► LineBuf ─┐
//!                                                    ├─► select_all ─► LogRecord::parse ─► emit()
//! child stderr ─► FramedRead<BytesCodec> ─► LineBuf ─┘        └─ Err / Oversized ─► warn + malformed += 1
//! ```
//!
//! Lines are split on `\n` and decoded lossily, so invalid UTF-8 ends up as
//! an undecodable record rather than a read error. A line longer than
//! [`MAX_LINE_BYTES`] is discarded up to its terminating newline and
//! reading resumes after it. Malformed lines never stop ingestion. The task
//! ends on EOF or read error of every input, or when [`LogProxy::stop`] is
//! called.

use std::collections::VecDeque;
use std::mem;
use std::time::Duration;

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use tokio::io::{AsyncRead, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::record::LogRecord;

/// Longest accepted line; longer lines are counted as malformed and skipped.
pub const MAX_LINE_BYTES: usize = 1 << 20;

const PIPE_BUFFER: usize = 64 * 1024;

/// One framed line of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Text(String),
    Oversized,
}

type Lines = BoxStream<'static, Line>;

/// Splits raw chunks into lines, resynchronizing after an overlong one.
#[derive(Debug, Default)]
struct LineBuf {
    buf: Vec<u8>,
    discarding: bool,
    ready: VecDeque<Line>,
}

impl LineBuf {
    fn extend(&mut self, mut chunk: &[u8]) {
        while let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
            self.absorb(&chunk[..pos]);
            self.complete();
            chunk = &chunk[pos + 1..];
        }
        self.absorb(chunk);
    }

    fn absorb(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        if self.buf.len() + bytes.len() > MAX_LINE_BYTES {
            self.buf = Vec::new();
            self.discarding = true;
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    fn complete(&mut self) {
        if mem::take(&mut self.discarding) {
            self.ready.push_back(Line::Oversized);
            return;
        }
        let raw = mem::take(&mut self.buf);
        let mut text = String::from_utf8_lossy(&raw).into_owned();
        if text.ends_with('\r') {
            text.pop();
        }
        self.ready.push_back(Line::Text(text));
    }

    /// Flushes an unterminated trailing line at EOF.
    fn finish(&mut self) {
        if self.discarding || !self.buf.is_empty() {
            self.complete();
        }
    }

    fn pop(&mut self) -> Option<Line> {
        self.ready.pop_front()
    }
}

/// Counters reported when ingestion ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines decoded and re-emitted.
    pub records: u64,
    /// Lines that could not be decoded.
    pub malformed: u64,
}

/// Handle to a running ingestion task.
#[derive(Debug)]
pub struct LogProxy {
    token: CancellationToken,
    join: JoinHandle<IngestStats>,
}

impl LogProxy {
    /// Starts ingesting `stdout` and `stderr` (either may be absent) in `span`.
    pub fn attach<O, E>(span: Span, stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        let mut inputs: Vec<Lines> = Vec::with_capacity(2);
        if let Some(out) = stdout {
            inputs.push(framed(out));
        }
        if let Some(err) = stderr {
            inputs.push(framed(err));
        }
        Self::spawn(span, stream::select_all(inputs))
    }

    /// Returns a writable pipe whose contents are ingested like server output.
    pub fn pipe(span: Span) -> (DuplexStream, Self) {
        let (writer, reader) = tokio::io::duplex(PIPE_BUFFER);
        let proxy = Self::attach::<_, DuplexStream>(span, Some(reader), None);
        (writer, proxy)
    }

    fn spawn(span: Span, lines: SelectAll<Lines>) -> Self {
        let token = CancellationToken::new();
        let join = tokio::spawn(scan(lines, token.clone()).instrument(span));
        Self { token, join }
    }

    /// Waits for every input to reach EOF.
    pub async fn finish(self) -> IngestStats {
        self.join.await.unwrap_or_default()
    }

    /// Gives the inputs `grace` to reach EOF, then stops ingestion.
    ///
    /// Used after the process has exited: the pipes normally close right
    /// away, but a forked helper may keep them open.
    pub async fn drain(mut self, grace: Duration) -> IngestStats {
        match time::timeout(grace, &mut self.join).await {
            Ok(res) => res.unwrap_or_default(),
            Err(_elapsed) => self.stop().await,
        }
    }

    /// Stops ingestion without waiting for EOF.
    pub async fn stop(self) -> IngestStats {
        self.token.cancel();
        self.join.await.unwrap_or_default()
    }
}

fn framed<R>(reader: R) -> Lines
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let chunks = FramedRead::new(reader, BytesCodec::new());
    stream::unfold(Some((chunks, LineBuf::default())), |state| async move {
        let (mut chunks, mut lines) = state?;
        loop {
            if let Some(line) = lines.pop() {
                return Some((line, Some((chunks, lines))));
            }
            match chunks.next().await {
                Some(Ok(chunk)) => lines.extend(&chunk),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Log stream read failed");
                    lines.finish();
                    return lines.pop().map(|line| (line, None));
                }
                None => {
                    lines.finish();
                    return lines.pop().map(|line| (line, None));
                }
            }
        }
    })
    .boxed()
}

async fn scan(mut lines: SelectAll<Lines>, token: CancellationToken) -> IngestStats {
    tracing::debug!("Log streaming started");
    let mut stats = IngestStats::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = lines.next() => next,
        };
        match next {
            None => break,
            Some(Line::Text(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match LogRecord::parse(&line) {
                    Ok(record) => {
                        record.emit();
                        stats.records += 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, line = %line, "Failed to unmarshal log entry");
                        stats.malformed += 1;
                    }
                }
            }
            Some(Line::Oversized) => {
                tracing::warn!(max = MAX_LINE_BYTES, "Log line too long; skipped");
                stats.malformed += 1;
            }
        }
    }

    tracing::debug!(
        records = stats.records,
        malformed = stats.malformed,
        "Log streaming ended"
    );
    stats
}

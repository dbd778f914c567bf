use crate::domain::entry::Severity;
use std::fmt::Debug;
use std::io;

/// The platform-local channel (syslog, serial port, ...).
///
/// A sink is opened ("set up") by its constructor, receives rendered lines through
/// [`write`](LocalSink::write) and is released by [`close`](LocalSink::close).
pub trait LocalSink: Send + Debug {
    /// Writes one rendered line (without trailing newline) at the given severity.
    fn write(&mut self, severity: Severity, line: &str) -> io::Result<()>;

    /// Releases the underlying handle. Called at most once by the logger.
    fn close(&mut self) -> io::Result<()>;
}

/// Writes every line to each of its sinks in turn. A failing sink does not keep the line from
/// the others; the first error is returned.
#[derive(Debug)]
pub struct TeeSink {
    sinks: Vec<Box<dyn LocalSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Box<dyn LocalSink>>) -> Self {
        TeeSink { sinks }
    }
}

fn first_error(results: impl Iterator<Item = io::Result<()>>) -> io::Result<()> {
    results.fold(Ok(()), |first, result| first.and(result))
}

impl LocalSink for TeeSink {
    fn write(&mut self, severity: Severity, line: &str) -> io::Result<()> {
        let results: Vec<_> = self
            .sinks
            .iter_mut()
            .map(|sink| sink.write(severity, line))
            .collect();
        first_error(results.into_iter())
    }

    fn close(&mut self) -> io::Result<()> {
        let results: Vec<_> = self.sinks.iter_mut().map(|sink| sink.close()).collect();
        first_error(results.into_iter())
    }
}

use crate::domain::entry::Severity;
use crate::domain::local::LocalSink;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// The first serial port on Windows. Its output shows up in the instance's serial console.
pub const COM1: &str = "COM1";

/// Line speed of the serial console.
pub const BAUD_RATE: u32 = 115_200;

/// Writes every line, whatever its severity, to a serial port (or any other device path).
pub struct SerialSink {
    port: Option<Box<dyn Write + Send>>,
}

impl fmt::Debug for SerialSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSink")
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialSink {
    /// Opens a device or file for writing, leaving its line settings alone.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let port = OpenOptions::new().write(true).open(path)?;
        Ok(SerialSink {
            port: Some(Box::new(port)),
        })
    }

    /// Opens a serial port, e.g. [`COM1`], at the given baud rate.
    #[cfg(windows)]
    pub fn open_port(name: &str, baud_rate: u32) -> io::Result<Self> {
        let port = serialport::new(name, baud_rate)
            .timeout(std::time::Duration::from_secs(1))
            .open()?;
        Ok(SerialSink {
            port: Some(Box::new(port)),
        })
    }
}

impl LocalSink for SerialSink {
    fn write(&mut self, _severity: Severity, line: &str) -> io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))?;
        let mut bytes = line.trim().as_bytes().to_vec();
        bytes.push(b'\n');
        port.write_all(&bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.port.take() {
            Some(mut port) => port.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn every_line_is_written() {
        let path = std::env::temp_dir().join(format!("guestlog-serial-{}", std::process::id()));
        fs::write(&path, b"").unwrap();

        let mut sink = SerialSink::open(&path).unwrap();
        sink.write(Severity::Debug, "one").unwrap();
        sink.write(Severity::Critical, "two  ").unwrap();
        sink.close().unwrap();
        assert!(sink.write(Severity::Info, "three").is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_device_fails_to_open() {
        let path = std::env::temp_dir()
            .join("guestlog-no-such-dir")
            .join("port");
        assert!(SerialSink::open(path).is_err());
    }
}

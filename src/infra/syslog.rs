use crate::domain::entry::Severity;
use crate::domain::local::LocalSink;
use crate::severity::syslog_severity;
use fasyslog::format::SyslogContext;
use fasyslog::sender::SyslogSender;
use fasyslog::Facility;
use std::io;

/// Sends lines to the local syslog daemon in RFC 3164 format, facility `daemon`, tagged with
/// the logger name.
#[derive(Debug)]
pub struct SyslogSink {
    sender: Option<SyslogSender>,
    context: SyslogContext,
}

impl SyslogSink {
    /// Connects to the well-known local syslog socket.
    pub fn open(app_name: &str) -> io::Result<Self> {
        let sender = fasyslog::sender::unix_well_known()?;
        Ok(Self::with_sender(sender, app_name))
    }

    pub fn with_sender(sender: SyslogSender, app_name: &str) -> Self {
        let mut context = SyslogContext::default();
        context.facility(Facility::DAEMON);
        context.appname(app_name);
        SyslogSink {
            sender: Some(sender),
            context,
        }
    }
}

impl LocalSink for SyslogSink {
    fn write(&mut self, severity: Severity, line: &str) -> io::Result<()> {
        let sender = self
            .sender
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "syslog sink is closed"))?;
        let message = self
            .context
            .format_rfc3164(syslog_severity(severity), Some(line));
        sender.send_formatted(message.to_string().as_bytes())
    }

    fn close(&mut self) -> io::Result<()> {
        match self.sender.take() {
            Some(mut sender) => sender.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::time::Duration;

    #[test]
    fn lines_reach_the_daemon_with_priority_and_tag() {
        let daemon = UdpSocket::bind("127.0.0.1:0").unwrap();
        daemon
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let sender = fasyslog::sender::udp("127.0.0.1:0", daemon.local_addr().unwrap()).unwrap();

        let mut sink = SyslogSink::with_sender(SyslogSender::Udp(sender), "guestlog-test");
        sink.write(Severity::Error, "disk full").unwrap();

        let mut buf = [0u8; 1024];
        let n = daemon.recv(&mut buf).unwrap();
        let received = String::from_utf8_lossy(&buf[..n]).to_string();
        // daemon(3) * 8 + err(3)
        assert!(received.starts_with("<27>"), "{received}");
        assert!(received.contains("guestlog-test"), "{received}");
        assert!(received.contains("disk full"), "{received}");
    }

    #[test]
    fn writes_after_close_fail() {
        let daemon = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender = fasyslog::sender::udp("127.0.0.1:0", daemon.local_addr().unwrap()).unwrap();
        let mut sink = SyslogSink::with_sender(SyslogSender::Udp(sender), "guestlog-test");
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write(Severity::Info, "late").is_err());
    }
}

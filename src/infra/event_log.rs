//! Writes to the Windows Event Log under an event source named after the logger.

use crate::domain::entry::Severity;
use crate::domain::local::LocalSink;
use crate::severity::{event_log_type, EventLogType};
use std::fmt;
use std::io;
use std::ptr;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::System::EventLog::{
    DeregisterEventSource, RegisterEventSourceW, ReportEventW, EVENTLOG_ERROR_TYPE,
    EVENTLOG_INFORMATION_TYPE, EVENTLOG_WARNING_TYPE, REPORT_EVENT_TYPE,
};
use winreg::enums::{HKEY_LOCAL_MACHINE, REG_EXPAND_SZ};
use winreg::{RegKey, RegValue};

/// The event ID of every entry.
pub const EVENT_ID: u32 = 882;

const SOURCES_KEY: &str = r"SYSTEM\CurrentControlSet\Services\EventLog\Application";

// EventCreate.exe carries a message for every event ID that just prints the inserted string.
const MESSAGE_FILE: &str = r"%SystemRoot%\System32\EventCreate.exe";

// Information | Warning | Error
const TYPES_SUPPORTED: u32 = 0x4 | 0x2 | 0x1;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Registers `source` in the Application log, using EventCreate.exe as message file. An
/// existing registration is updated.
pub fn install_source(source: &str) -> io::Result<()> {
    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let (key, _) = hklm.create_subkey(format!(r"{}\{}", SOURCES_KEY, source))?;
    key.set_raw_value(
        "EventMessageFile",
        &RegValue {
            bytes: wide(MESSAGE_FILE)
                .iter()
                .flat_map(|c| c.to_le_bytes())
                .collect(),
            vtype: REG_EXPAND_SZ,
        },
    )?;
    key.set_value("TypesSupported", &TYPES_SUPPORTED)?;
    key.set_value("CustomSource", &1u32)
}

fn report_type(severity: Severity) -> REPORT_EVENT_TYPE {
    match event_log_type(severity) {
        EventLogType::Information => EVENTLOG_INFORMATION_TYPE,
        EventLogType::Warning => EVENTLOG_WARNING_TYPE,
        EventLogType::Error => EVENTLOG_ERROR_TYPE,
    }
}

pub struct EventLogSink {
    handle: HANDLE,
}

// The handle is only used through &mut self.
unsafe impl Send for EventLogSink {}

impl fmt::Debug for EventLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogSink")
            .field("open", &!self.handle.is_null())
            .finish()
    }
}

impl EventLogSink {
    /// Installs the event source `source` and opens it.
    pub fn open(source: &str) -> io::Result<Self> {
        install_source(source)?;
        let name = wide(source);
        let handle = unsafe { RegisterEventSourceW(ptr::null(), name.as_ptr()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(EventLogSink { handle })
    }
}

impl LocalSink for EventLogSink {
    fn write(&mut self, severity: Severity, line: &str) -> io::Result<()> {
        if self.handle.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "event log sink is closed",
            ));
        }
        let message = wide(line);
        let strings = [message.as_ptr()];
        let reported = unsafe {
            ReportEventW(
                self.handle,
                report_type(severity),
                0,
                EVENT_ID,
                ptr::null_mut(),
                1,
                0,
                strings.as_ptr(),
                ptr::null(),
            )
        };
        if reported == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.handle.is_null() {
            return Ok(());
        }
        let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
        if unsafe { DeregisterEventSource(handle) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for EventLogSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

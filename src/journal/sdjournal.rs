// Journal handle backed by libsystemd's sd-journal API

use crate::journal::{Journal, JournalSource, RawEntry};
use std::ffi::CString;
use std::io;
use std::os::raw::{c_char, c_int, c_void};
use std::time::Duration;

#[link(name = "systemd")]
extern "C" {
    fn sd_journal_open(ret: *mut *mut c_void, flags: c_int) -> c_int;
    fn sd_journal_close(j: *mut c_void);
    fn sd_journal_add_match(j: *mut c_void, data: *const c_void, size: usize) -> c_int;
    fn sd_journal_seek_tail(j: *mut c_void) -> c_int;
    fn sd_journal_previous(j: *mut c_void) -> c_int;
    fn sd_journal_next(j: *mut c_void) -> c_int;
    fn sd_journal_get_realtime_usec(j: *mut c_void, ret: *mut u64) -> c_int;
    fn sd_journal_get_data(
        j: *mut c_void,
        field: *const c_char,
        data: *mut *const u8,
        length: *mut usize,
    ) -> c_int;
    fn sd_journal_wait(j: *mut c_void, timeout_usec: u64) -> c_int;
}

const SD_JOURNAL_LOCAL_ONLY: c_int = 1;
const ENOENT: c_int = 2;

/// Opens handles on the local journal through libsystemd
#[derive(Debug, Clone, Copy, Default)]
pub struct SdJournalSource;

impl JournalSource for SdJournalSource {
    fn open(&self) -> io::Result<Box<dyn Journal>> {
        let mut handle: *mut c_void = std::ptr::null_mut();
        check(unsafe { sd_journal_open(&mut handle, SD_JOURNAL_LOCAL_ONLY) })?;
        if handle.is_null() {
            return Err(io::Error::other("sd_journal_open returned no handle"));
        }
        Ok(Box::new(SdJournal { handle }))
    }
}

/// Owns one `sd_journal*`; closed on drop
struct SdJournal {
    handle: *mut c_void,
}

/// Map a negative errno return onto `io::Error`
fn check(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::from_raw_os_error(-rc))
    } else {
        Ok(rc)
    }
}

impl SdJournal {
    fn field(&self, name: &str) -> io::Result<String> {
        let field = CString::new(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut data: *const u8 = std::ptr::null();
        let mut length: usize = 0;

        let rc = unsafe { sd_journal_get_data(self.handle, field.as_ptr(), &mut data, &mut length) };
        if rc == -ENOENT {
            return Ok(String::new());
        }
        check(rc)?;
        if data.is_null() {
            return Ok(String::new());
        }

        // Data comes back as "FIELD=value"
        let bytes = unsafe { std::slice::from_raw_parts(data, length) };
        let value = bytes
            .strip_prefix(name.as_bytes())
            .and_then(|rest| rest.strip_prefix(b"="))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("malformed {} field", name))
            })?;
        Ok(String::from_utf8_lossy(value).into_owned())
    }
}

impl Journal for SdJournal {
    fn add_match(&mut self, field: &str, value: &str) -> io::Result<()> {
        let expr = format!("{}={}", field, value);
        check(unsafe {
            sd_journal_add_match(self.handle, expr.as_ptr() as *const c_void, expr.len())
        })?;
        Ok(())
    }

    fn seek_tail(&mut self) -> io::Result<()> {
        check(unsafe { sd_journal_seek_tail(self.handle) })?;
        Ok(())
    }

    fn previous(&mut self) -> io::Result<bool> {
        Ok(check(unsafe { sd_journal_previous(self.handle) })? > 0)
    }

    fn next(&mut self) -> io::Result<bool> {
        Ok(check(unsafe { sd_journal_next(self.handle) })? > 0)
    }

    fn entry(&mut self) -> io::Result<RawEntry> {
        let mut realtime_usec: u64 = 0;
        check(unsafe { sd_journal_get_realtime_usec(self.handle, &mut realtime_usec) })?;
        Ok(RawEntry {
            realtime_usec,
            message: self.field("MESSAGE")?,
            priority: self.field("PRIORITY")?,
        })
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        let usec = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        check(unsafe { sd_journal_wait(self.handle, usec) })?;
        Ok(())
    }
}

impl Drop for SdJournal {
    fn drop(&mut self) {
        unsafe { sd_journal_close(self.handle) };
    }
}

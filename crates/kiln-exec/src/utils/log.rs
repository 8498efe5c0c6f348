//! Stderr reporting usable between `fork()` and `execve()`.
//!
//! Only stack buffers and raw `write(2)` calls are allowed in that window, so
//! nothing here allocates or takes locks.

/// Write `prefix`, the errno of `err` (when present) and a newline to stderr.
#[cfg(unix)]
pub fn pre_exec_report(prefix: &[u8], err: &std::io::Error) {
    raw_write(prefix);
    if let Some(code) = err.raw_os_error() {
        let mut buf = [0u8; 24];
        raw_write(b" errno=");
        raw_write(format_i32(code, &mut buf));
    }
    raw_write(b"\n");
}

#[cfg(not(unix))]
pub fn pre_exec_report(prefix: &[u8], err: &std::io::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(prefix);
    let _ = writeln!(stderr, " {err}");
}

#[cfg(unix)]
fn raw_write(bytes: &[u8]) {
    // SAFETY: the pointer and length come from a live slice; write(2) is async-signal-safe.
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
    }
}

/// Render `value` in decimal into the tail of `buf`.
#[cfg(unix)]
fn format_i32(value: i32, buf: &mut [u8; 24]) -> &[u8] {
    let mut n = value.unsigned_abs();
    let mut idx = buf.len();
    loop {
        idx -= 1;
        buf[idx] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if value < 0 {
        idx -= 1;
        buf[idx] = b'-';
    }
    &buf[idx..]
}

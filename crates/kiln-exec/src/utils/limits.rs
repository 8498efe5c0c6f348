//! POSIX rlimits for compiler processes.
//!
//! Limits are installed in a `pre_exec` hook, so they are in force before the
//! compiler's first instruction. The soft limit is set to the requested value;
//! the hard limit is never lowered below its current value unless the request
//! exceeds it. On non-Unix targets a request is logged and ignored.

use tokio::process::Command;

use kiln_model::ProcessLimits;

use crate::{ExecError, error::ExecResult};

/// Reject limits that would make every compiler run fail.
pub fn validate_limits(limits: &ProcessLimits) -> ExecResult<()> {
    if limits.max_file_size_bytes == Some(0) {
        return Err(ExecError::InvalidConfig(
            "limits.maxFileSizeBytes cannot be zero".into(),
        ));
    }
    if limits.max_open_files.is_some_and(|n| n < 3) {
        return Err(ExecError::InvalidConfig(
            "limits.maxOpenFiles must leave room for stdio".into(),
        ));
    }
    Ok(())
}

/// Install `limits` on `cmd`. Empty limits leave the command untouched.
pub fn attach_limits(cmd: &mut Command, limits: &ProcessLimits) {
    if limits.is_empty() {
        return;
    }

    #[cfg(unix)]
    unix_impl::attach(cmd, limits);

    #[cfg(not(unix))]
    {
        let _ = cmd;
        tracing::warn!(?limits, "process limits are not supported on this platform; ignoring");
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use kiln_model::ProcessLimits;
    use tokio::process::Command;

    use crate::utils::log::pre_exec_report;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    type Resource = libc::__rlimit_resource_t;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    type Resource = libc::c_int;

    /// One `setrlimit` call to make in the child.
    #[derive(Clone, Copy)]
    struct Request {
        resource: Resource,
        value: u64,
        failure: &'static [u8],
    }

    fn requests(limits: &ProcessLimits) -> Vec<Request> {
        let mut out = Vec::with_capacity(3);
        if let Some(n) = limits.max_open_files {
            out.push(Request {
                resource: libc::RLIMIT_NOFILE as Resource,
                value: n,
                failure: b"kiln-exec: setting RLIMIT_NOFILE failed",
            });
        }
        if let Some(bytes) = limits.max_file_size_bytes {
            out.push(Request {
                resource: libc::RLIMIT_FSIZE as Resource,
                value: bytes,
                failure: b"kiln-exec: setting RLIMIT_FSIZE failed",
            });
        }
        if limits.disable_core_dumps {
            out.push(Request {
                resource: libc::RLIMIT_CORE as Resource,
                value: 0,
                failure: b"kiln-exec: setting RLIMIT_CORE failed",
            });
        }
        out
    }

    pub(super) fn attach(cmd: &mut Command, limits: &ProcessLimits) {
        let requests = requests(limits);
        // SAFETY: the hook only calls getrlimit/setrlimit and write(2), all async-signal-safe,
        // and reads the `requests` vector allocated before fork.
        unsafe {
            cmd.pre_exec(move || {
                for req in &requests {
                    if let Err(e) = apply(req.resource, req.value) {
                        pre_exec_report(req.failure, &e);
                        return Err(e);
                    }
                }
                Ok(())
            });
        }
    }

    fn apply(resource: Resource, value: u64) -> io::Result<()> {
        let soft = libc::rlim_t::try_from(value).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "rlimit value exceeds platform maximum")
        })?;

        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `current` is a valid, writable rlimit.
        if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let hard = if current.rlim_max == libc::RLIM_INFINITY || current.rlim_max > soft {
            current.rlim_max
        } else {
            soft
        };
        let wanted = libc::rlimit {
            rlim_cur: soft,
            rlim_max: hard,
        };
        // SAFETY: `wanted` is a valid rlimit for the duration of the call.
        if unsafe { libc::setrlimit(resource, &wanted) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_unusable_limits() {
        assert!(validate_limits(&ProcessLimits::default()).is_ok());

        let zero_size = ProcessLimits {
            max_file_size_bytes: Some(0),
            ..ProcessLimits::default()
        };
        assert!(validate_limits(&zero_size).is_err());

        let no_stdio = ProcessLimits {
            max_open_files: Some(2),
            ..ProcessLimits::default()
        };
        assert!(validate_limits(&no_stdio).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn limits_are_visible_to_the_child() {
        let limits = ProcessLimits {
            max_open_files: Some(256),
            max_file_size_bytes: Some(1024 * 1024),
            disable_core_dumps: true,
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("ulimit -n; ulimit -c");
        attach_limits(&mut cmd, &limits);

        let out = cmd.output().await.unwrap();
        assert!(out.status.success());
        let text = String::from_utf8_lossy(&out.stdout);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["256", "0"]);
    }
}

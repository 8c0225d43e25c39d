//! Exit status of a finished child

use std::fmt;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    #[cfg(unix)]
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        #[cfg(unix)]
        {
            self.signal.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Exit code as a shell would report it.
    ///
    /// A child killed by signal `N` reports `128 + N`.
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.code {
            return code;
        }
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal {
                return 128 + signal;
            }
        }
        -1
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal {
                return write!(f, "signal {}", signal);
            }
        }
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("unknown status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        let status = ExitStatus {
            code: Some(0),
            #[cfg(unix)]
            signal: None,
        };
        assert!(status.success());
        assert!(!status.terminated_by_signal());
        assert_eq!(status.exit_code(), 0);
        assert_eq!(status.to_string(), "exit code 0");
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_maps_to_shell_exit_code() {
        let status = ExitStatus {
            code: None,
            signal: Some(9),
        };
        assert!(!status.success());
        assert!(status.terminated_by_signal());
        assert_eq!(status.exit_code(), 137);
        assert_eq!(status.to_string(), "signal 9");
    }
}

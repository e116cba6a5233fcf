//! Waiting for the host application to exit before files are replaced.

use std::ffi::OsStr;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Answers whether a process with a given name is running.
pub trait HostProbe: Send {
    fn is_running(&mut self, process_name: &str) -> bool;
}

/// [`HostProbe`] backed by the operating system's process table.
///
/// Names match exactly after removing a trailing `.exe`. On Windows the
/// comparison ignores ASCII case.
pub struct SystemHostProbe {
    system: System,
}

impl SystemHostProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()),
            ),
        }
    }
}

impl Default for SystemHostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SystemHostProbe {
    fn is_running(&mut self, process_name: &str) -> bool {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        let own_pid = sysinfo::get_current_pid().ok();

        self.system
            .processes()
            .values()
            .filter(|process| Some(process.pid()) != own_pid)
            .any(|process| names_match(process.name(), process_name))
    }
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

fn names_match(process_name: &OsStr, wanted: &str) -> bool {
    let actual = process_name.to_string_lossy();
    let (actual, wanted) = (strip_exe(&actual), strip_exe(wanted.trim()));
    if cfg!(windows) {
        actual.eq_ignore_ascii_case(wanted)
    } else {
        actual == wanted
    }
}

/// Poll until `process_name` is gone or `timeout` passes.
///
/// Returns `true` if the host exited and `false` if the wait gave up. Giving
/// up is not an error; the caller proceeds anyway.
pub async fn wait_for_host_exit(
    probe: &mut dyn HostProbe,
    process_name: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut announced = false;

    loop {
        if !probe.is_running(process_name) {
            if announced {
                info!("{process_name} has exited");
            } else {
                debug!("{process_name} is not running");
            }
            return true;
        }

        if !announced {
            info!("Waiting for {process_name} to exit (up to {}s)", timeout.as_secs());
            announced = true;
        }

        if Instant::now() + poll_interval > deadline {
            warn!("Gave up waiting for {process_name} to exit; proceeding anyway");
            return false;
        }

        tokio::time::sleep(poll_interval).await;
    }
}

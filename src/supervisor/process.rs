use crate::utils::error::{BlingError, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Forcibly stops a process.
pub trait Terminator {
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Starts the managed service.
pub trait Launcher {
    fn launch(&self, mode: LaunchMode) -> Result<LaunchOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Blocks; output goes straight to the terminal.
    Attached,
    /// Returns at once with the new pid.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Attached service ran to completion (exit code if it had one).
    Exited { code: Option<i32> },
    Spawned { pid: u32 },
}

/// SIGKILL through `sysinfo`, then wait for the process to go away.
#[derive(Debug, Clone)]
pub struct SysinfoTerminator {
    exit_timeout: Duration,
    poll_interval: Duration,
}

impl Default for SysinfoTerminator {
    fn default() -> Self {
        Self {
            exit_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

// A killed child we have not reaped lingers as a zombie; it no longer holds
// its sockets, so it counts as gone.
fn is_gone(system: &System, pid: Pid) -> bool {
    system
        .process(pid)
        .map(|p| p.status() == ProcessStatus::Zombie)
        .unwrap_or(true)
}

impl Terminator for SysinfoTerminator {
    fn terminate(&self, pid: u32) -> Result<()> {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

        let process = system
            .process(target)
            .ok_or(BlingError::ProcessNotFound { pid })?;
        tracing::debug!("Sending SIGKILL to {} ({:?})", pid, process.name());

        if !process.kill() {
            return Err(BlingError::TerminationFailed {
                pid,
                reason: "kill signal was refused".to_string(),
            });
        }

        let deadline = Instant::now() + self.exit_timeout;
        loop {
            system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
            if is_gone(&system, target) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BlingError::TerminationFailed {
                    pid,
                    reason: format!("still running after {:?}", self.exit_timeout),
                });
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

/// Program and arguments of the managed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServiceCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `uvicorn app.main:app` on every interface.
    pub fn uvicorn(port: u16) -> Self {
        let port = port.to_string();
        Self::new(
            "uvicorn",
            &["app.main:app", "--host", "0.0.0.0", "--port", port.as_str()],
        )
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn launch_error(&self, source: std::io::Error) -> BlingError {
        BlingError::LaunchFailed {
            program: self.program.clone(),
            source,
        }
    }
}

impl std::fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    command: ServiceCommand,
    log_path: PathBuf,
}

impl ServiceLauncher {
    pub fn new(command: ServiceCommand, log_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            log_path: log_path.into(),
        }
    }

    fn run_attached(&self) -> Result<LaunchOutcome> {
        let status = self
            .command
            .command()
            .status()
            .map_err(|e| self.command.launch_error(e))?;

        if !status.success() {
            return Err(BlingError::ServiceExited {
                status: status.to_string(),
            });
        }
        Ok(LaunchOutcome::Exited {
            code: status.code(),
        })
    }

    fn spawn_detached(&self) -> Result<LaunchOutcome> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let log_err = log.try_clone()?;

        let mut cmd = self.command.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        // 脫離終端機的 process group，關掉終端機也不會收到 SIGHUP
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| self.command.launch_error(e))?;
        Ok(LaunchOutcome::Spawned { pid: child.id() })
    }
}

impl Launcher for ServiceLauncher {
    fn launch(&self, mode: LaunchMode) -> Result<LaunchOutcome> {
        match mode {
            LaunchMode::Attached => {
                tracing::info!("▶️ Starting in foreground: {}", self.command);
                self.run_attached()
            }
            LaunchMode::Detached => {
                tracing::info!(
                    "▶️ Starting in background: {} (output: {})",
                    self.command,
                    self.log_path.display()
                );
                self.spawn_detached()
            }
        }
    }
}

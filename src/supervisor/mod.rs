//! 服務重啟：找出佔用 port 的程序、強制結束、等待 port 釋放後重新啟動。

pub mod probe;
pub mod process;

pub use probe::{ListenerProbe, LsofProbe, ProcNetProbe, SystemProbe};
pub use process::{
    LaunchMode, LaunchOutcome, Launcher, ServiceCommand, ServiceLauncher, SysinfoTerminator,
    Terminator,
};

use crate::utils::error::Result;
use std::time::Duration;

pub const SERVICE_PORT: u16 = 8000;
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);
pub const SERVER_LOG_FILE: &str = "server.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// Stop, then relaunch in the background.
    Restart,
    KillOnly,
    /// Stop if running, then relaunch attached to the terminal.
    Foreground,
}

impl RestartMode {
    /// `--kill-only` wins over `--foreground`.
    pub fn from_flags(kill_only: bool, foreground: bool) -> Self {
        match (kill_only, foreground) {
            (true, _) => RestartMode::KillOnly,
            (false, true) => RestartMode::Foreground,
            (false, false) => RestartMode::Restart,
        }
    }

    fn launch_mode(self) -> Option<LaunchMode> {
        match self {
            RestartMode::Restart => Some(LaunchMode::Detached),
            RestartMode::Foreground => Some(LaunchMode::Attached),
            RestartMode::KillOnly => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub port: u16,
    /// Every process stopped; empty when nothing was listening.
    pub terminated: Vec<u32>,
    pub launched: Option<LaunchOutcome>,
}

pub struct Supervisor<P: ListenerProbe, T: Terminator, L: Launcher> {
    probe: P,
    terminator: T,
    launcher: L,
    port: u16,
    settle_delay: Duration,
}

impl Supervisor<SystemProbe, SysinfoTerminator, ServiceLauncher> {
    /// The uvicorn service on port 8000, logging to `server.log`.
    pub fn system() -> Self {
        Self::new(
            SystemProbe::default(),
            SysinfoTerminator::default(),
            ServiceLauncher::new(ServiceCommand::uvicorn(SERVICE_PORT), SERVER_LOG_FILE),
            SERVICE_PORT,
        )
    }
}

impl<P: ListenerProbe, T: Terminator, L: Launcher> Supervisor<P, T, L> {
    pub fn new(probe: P, terminator: T, launcher: L, port: u16) -> Self {
        Self {
            probe,
            terminator,
            launcher,
            port,
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Stops every process listening on the port, then relaunches unless
    /// kill-only.
    pub fn run(&self, mode: RestartMode) -> Result<RestartOutcome> {
        tracing::info!("🔍 Looking for a process on port {}", self.port);

        let terminated = self.probe.locate(self.port)?;
        if terminated.is_empty() {
            tracing::info!("No process found on port {}", self.port);
        } else {
            for &pid in &terminated {
                tracing::info!("🛑 Stopping process {} on port {}", pid, self.port);
                self.terminator.terminate(pid)?;
            }
            // 等 OS 釋放 port，避免新程序 bind 失敗
            std::thread::sleep(self.settle_delay);
        }

        let launched = match mode.launch_mode() {
            Some(launch_mode) => Some(self.launcher.launch(launch_mode)?),
            None => None,
        };

        Ok(RestartOutcome {
            port: self.port,
            terminated,
            launched,
        })
    }
}

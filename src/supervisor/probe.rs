use crate::utils::error::{BlingError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Finds the processes listening on a TCP port.
pub trait ListenerProbe {
    /// Every pid holding a listening socket on `port`, ascending. A forked
    /// worker shares its parent's socket, so there may be several. Empty when
    /// nothing listens; that is a normal outcome.
    fn locate(&self, port: u16) -> Result<Vec<u32>>;
}

const TCP_LISTEN_STATE: &str = "0A";

/// Socket inodes in LISTEN state on `port`, from a `/proc/net/tcp{,6}` table.
pub fn listening_inodes(table: &str, port: u16) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN_STATE {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            if u16::from_str_radix(port_hex, 16).ok()? != port {
                return None;
            }
            fields[9].parse::<u64>().ok().filter(|inode| *inode != 0)
        })
        .collect()
}

/// Resolves listeners from the Linux procfs socket tables.
#[derive(Debug, Clone)]
pub struct ProcNetProbe {
    proc_root: PathBuf,
}

impl Default for ProcNetProbe {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcNetProbe {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.proc_root.join("net/tcp").exists()
    }

    fn inodes_for(&self, port: u16) -> Result<Vec<u64>> {
        let mut inodes = Vec::new();
        for table in ["net/tcp", "net/tcp6"] {
            match std::fs::read_to_string(self.proc_root.join(table)) {
                Ok(content) => inodes.extend(listening_inodes(&content, port)),
                // IPv6 may be disabled
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(BlingError::ListenerLookupError {
                        port,
                        message: format!("cannot read {}: {}", table, e),
                    })
                }
            }
        }
        Ok(inodes)
    }

    /// Pids holding any of `inodes`. Fails when some inode has no visible
    /// owner, since the port would still be busy after a restart.
    fn owners_of(&self, port: u16, inodes: &[u64]) -> Result<Vec<u32>> {
        let targets: Vec<String> = inodes.iter().map(|i| format!("socket:[{}]", i)).collect();
        let mut owned = vec![false; targets.len()];

        let mut pids: Vec<u32> = std::fs::read_dir(&self.proc_root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();

        let mut owners = Vec::new();
        for pid in pids {
            // Processes of other users are unreadable; they show up below as
            // unowned inodes.
            let held = sockets_held(&self.proc_root.join(pid.to_string()).join("fd"), &targets);
            if held.is_empty() {
                continue;
            }
            for index in held {
                owned[index] = true;
            }
            owners.push(pid);
        }

        if owned.iter().any(|o| !o) {
            return Err(BlingError::ListenerLookupError {
                port,
                message: "a listening socket has no owner visible in /proc (another user's process?)"
                    .to_string(),
            });
        }
        Ok(owners)
    }
}

/// Indexes into `targets` of the sockets open in `fd_dir`.
fn sockets_held(fd_dir: &Path, targets: &[String]) -> Vec<usize> {
    let Ok(entries) = std::fs::read_dir(fd_dir) else {
        return Vec::new();
    };
    let mut held: Vec<usize> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter_map(|link| {
            let link = link.to_str()?;
            targets.iter().position(|t| t == link)
        })
        .collect();
    held.sort_unstable();
    held.dedup();
    held
}

impl ListenerProbe for ProcNetProbe {
    fn locate(&self, port: u16) -> Result<Vec<u32>> {
        let inodes = self.inodes_for(port)?;
        if inodes.is_empty() {
            return Ok(Vec::new());
        }
        self.owners_of(port, &inodes)
    }
}

/// Asks `lsof` for the listener; used where procfs is not available.
#[derive(Debug, Clone, Default)]
pub struct LsofProbe;

impl ListenerProbe for LsofProbe {
    fn locate(&self, port: u16) -> Result<Vec<u32>> {
        let output = Command::new("lsof")
            .arg("-t")
            .arg(format!("-iTCP:{}", port))
            .arg("-sTCP:LISTEN")
            .output()
            .map_err(|e| BlingError::ListenerLookupError {
                port,
                message: format!("failed to run lsof: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut pids: Vec<u32> = stdout
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect();
        pids.sort_unstable();
        pids.dedup();

        // lsof exits 1 when nothing matches
        if pids.is_empty() && !output.status.success() && !output.stderr.is_empty() {
            return Err(BlingError::ListenerLookupError {
                port,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(pids)
    }
}

/// procfs on Linux, `lsof` everywhere else.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe {
    procfs: ProcNetProbe,
}

impl ListenerProbe for SystemProbe {
    fn locate(&self, port: u16) -> Result<Vec<u32>> {
        if self.procfs.is_available() {
            self.procfs.locate(port)
        } else {
            LsofProbe.locate(port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 41234 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F40 0100007F:C350 01 00000000:00000000 00:00000000 00000000  1000        0 41299 1 0000000000000000 20 4 30 10 -1
   2: 0100007F:0CEA 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 51000 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn test_listening_inodes_filters_by_state_and_port() {
        // 0x1F40 = 8000, 0x0CEA = 3306
        assert_eq!(listening_inodes(TCP_TABLE, 8000), vec![41234]);
        assert_eq!(listening_inodes(TCP_TABLE, 3306), vec![51000]);
        assert!(listening_inodes(TCP_TABLE, 9000).is_empty());
    }

    #[test]
    fn test_listening_inodes_ipv6_row() {
        let table = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:1F40 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 777 1 0000000000000000 100 0 0 10 0
";
        assert_eq!(listening_inodes(table, 8000), vec![777]);
    }

    fn fake_proc(table: &str) -> tempfile::TempDir {
        let root = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("net")).unwrap();
        std::fs::write(root.path().join("net/tcp"), table).unwrap();
        root
    }

    #[test]
    fn test_procfs_without_listener_is_empty() {
        let root = fake_proc(TCP_TABLE);
        let probe = ProcNetProbe::new(root.path());

        assert!(probe.is_available());
        assert!(probe.locate(9000).unwrap().is_empty());
    }

    #[test]
    fn test_unowned_listening_socket_is_a_lookup_error() {
        // LISTEN row on 8000 but no readable process holds inode 41234
        let root = fake_proc(TCP_TABLE);
        let probe = ProcNetProbe::new(root.path());

        let result = probe.locate(8000);
        assert!(matches!(
            result,
            Err(BlingError::ListenerLookupError { port: 8000, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_procfs_reports_every_holder_of_the_socket() {
        let root = fake_proc(TCP_TABLE);
        for pid in ["300", "120"] {
            let fd_dir = root.path().join(pid).join("fd");
            std::fs::create_dir_all(&fd_dir).unwrap();
            std::os::unix::fs::symlink("socket:[41234]", fd_dir.join("3")).unwrap();
        }
        let other = root.path().join("77/fd");
        std::fs::create_dir_all(&other).unwrap();
        std::os::unix::fs::symlink("socket:[99999]", other.join("3")).unwrap();

        let probe = ProcNetProbe::new(root.path());
        assert_eq!(probe.locate(8000).unwrap(), vec![120, 300]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_procfs_probe_finds_own_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let pids = ProcNetProbe::default().locate(port).unwrap();
        assert_eq!(pids, vec![std::process::id()]);

        drop(listener);
    }
}

//! Live host access through `/proc/<pid>/mem`

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use crate::{ProcessMemory, Result, Unavailable};

/// Positional reads and writes against a running process.
///
/// Requires ptrace permission over the target (same user with a permissive
/// `ptrace_scope`, or `CAP_SYS_PTRACE`).
pub struct ProcMemory {
    pid: u32,
    file: Option<File>,
}

impl ProcMemory {
    /// Attach to `pid`. A failed open yields a detached backend.
    pub fn attach(pid: u32) -> Self {
        let path = Self::mem_path(pid);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => {
                log::info!("Attached to process {}", pid);
                Some(file)
            }
            Err(err) => {
                log::warn!("Cannot open {}: {}", path.display(), err);
                None
            }
        };
        Self { pid, file }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn mem_path(pid: u32) -> PathBuf {
        PathBuf::from(format!("/proc/{}/mem", pid))
    }

    fn file(&self) -> Result<&File> {
        match &self.file {
            Some(file) if self.process_alive() => Ok(file),
            _ => Err(Unavailable::Detached),
        }
    }

    fn process_alive(&self) -> bool {
        PathBuf::from(format!("/proc/{}", self.pid)).exists()
    }
}

impl ProcessMemory for ProcMemory {
    fn is_attached(&self) -> bool {
        self.file.is_some() && self.process_alive()
    }

    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        self.file()?
            .read_exact_at(buf, address)
            .map_err(|_| Unavailable::AccessFault { address, len })
    }

    /// Checks the whole range is readable before writing. If the write
    /// still fails partway, the bytes read beforehand are written back.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let file = self.file()?;
        let fault = Unavailable::AccessFault {
            address,
            len: data.len(),
        };

        let mut previous = vec![0u8; data.len()];
        file.read_exact_at(&mut previous, address)
            .map_err(|_| fault.clone())?;

        if let Err(err) = file.write_all_at(data, address) {
            match file.write_all_at(&previous, address) {
                Ok(()) => log::warn!("Write at {:#x} failed and was rolled back: {}", address, err),
                Err(restore) => log::warn!(
                    "Write at {:#x} failed ({}) and rollback failed ({}): target may be partially written",
                    address,
                    err,
                    restore
                ),
            }
            return Err(fault);
        }
        Ok(())
    }
}

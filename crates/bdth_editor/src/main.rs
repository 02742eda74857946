//! bdth - housing placement inspector
//!
//! Attaches to a running host, prints what the placement tool sees as JSON,
//! and optionally keeps watching.
//!
//! Run with: bdth <pid> [layout.toml] [--watch] [--apply]
//!       or: bdth --simulate [layout.toml]
//!
//! `BDTH_PID` and `BDTH_LAYOUT` stand in for the positional arguments.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use glam::{Quat, Vec3};

use bdth_editor::{ControlPanel, DebugReport, FileSettingsStore, LogDispatch, MemorySettingsStore, SettingsStore};
use bdth_memory::{ForeignMemoryView, HostLayout, LayoutMode, ProcessMemory, SimulatedHost, Transform};

const USAGE: &str = "usage: bdth <pid> [layout.toml] [--watch] [--apply]\n       bdth --simulate [layout.toml] [--watch]";

/// Interval between reports in watch mode
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct Options {
    pid: Option<u32>,
    layout: Option<PathBuf>,
    watch: bool,
    simulate: bool,
    /// Re-apply persisted toggles to the host before reporting
    apply: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut opts = Self::default();
        for arg in args {
            match arg.as_str() {
                "--watch" => opts.watch = true,
                "--simulate" => opts.simulate = true,
                "--apply" => opts.apply = true,
                "-h" | "--help" => return Err(USAGE.to_string()),
                flag if flag.starts_with('-') => return Err(format!("Unknown flag: {}\n{}", flag, USAGE)),
                value => match value.parse::<u32>() {
                    Ok(pid) if opts.pid.is_none() => opts.pid = Some(pid),
                    _ if opts.layout.is_none() => opts.layout = Some(PathBuf::from(value)),
                    _ => return Err(format!("Unexpected argument: {}\n{}", value, USAGE)),
                },
            }
        }
        Ok(opts)
    }

    /// Fill missing arguments from the environment.
    fn with_env(mut self) -> Result<Self, String> {
        if self.pid.is_none() {
            if let Ok(value) = std::env::var("BDTH_PID") {
                let pid = value
                    .parse()
                    .map_err(|_| format!("BDTH_PID is not a process id: {}", value))?;
                self.pid = Some(pid);
            }
        }
        if self.layout.is_none() {
            self.layout = std::env::var_os("BDTH_LAYOUT").map(PathBuf::from);
        }
        if self.pid.is_none() && !self.simulate {
            return Err(USAGE.to_string());
        }
        Ok(self)
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = match Options::parse(std::env::args().skip(1)).and_then(Options::with_env) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    let layout = match &opts.layout {
        Some(path) => match HostLayout::load(path) {
            Ok(layout) => layout,
            Err(err) => {
                log::error!("Cannot use layout {:?}: {}", path, err);
                return ExitCode::FAILURE;
            }
        },
        None => HostLayout::default(),
    };
    if let Err(err) = layout.validate() {
        log::error!("Invalid layout: {}", err);
        return ExitCode::FAILURE;
    }

    if opts.simulate {
        return run(ForeignMemoryView::new(simulated_host(&layout), layout), &opts);
    }

    match opts.pid {
        Some(pid) => attach_and_run(pid, layout, &opts),
        None => ExitCode::from(2),
    }
}

#[cfg(target_os = "linux")]
fn attach_and_run(pid: u32, layout: HostLayout, opts: &Options) -> ExitCode {
    let memory = bdth_memory::ProcMemory::attach(pid);
    if !memory.is_attached() {
        log::error!("Could not attach to process {}", pid);
        return ExitCode::FAILURE;
    }
    run(ForeignMemoryView::new(memory, layout), opts)
}

#[cfg(not(target_os = "linux"))]
fn attach_and_run(pid: u32, _layout: HostLayout, _opts: &Options) -> ExitCode {
    log::error!("Attaching to process {} is only supported on Linux", pid);
    ExitCode::FAILURE
}

/// A host in rotate mode with one selected item.
fn simulated_host(layout: &HostLayout) -> bdth_memory::MemoryImage {
    let mut host = SimulatedHost::new(layout);
    let item = host.spawn_item(Transform::new(
        Vec3::new(12.5, 0.0, -4.25),
        Quat::from_rotation_y(30f32.to_radians()),
    ));
    host.set_mode(LayoutMode::Rotate);
    host.select(Some(item));
    log::info!("Simulating host with item at {:#x}", item);
    host.into_image()
}

fn open_store() -> Box<dyn SettingsStore> {
    match FileSettingsStore::open_default() {
        Ok(store) => Box::new(store),
        Err(err) => {
            log::warn!("Settings unavailable, using defaults: {}", err);
            Box::new(MemorySettingsStore::default())
        }
    }
}

fn run<M: ProcessMemory>(mut view: ForeignMemoryView<M>, opts: &Options) -> ExitCode {
    let mut panel = ControlPanel::new(open_store(), LogDispatch);

    if opts.apply {
        if let Err(err) = panel.apply_startup(&mut view) {
            log::warn!("Startup settings not fully applied: {}", err);
        }
    }

    let mut last: Option<DebugReport> = None;
    loop {
        let report = DebugReport::capture(&view, panel.settings(), panel.engine());

        if last.as_ref().map(|r| r.gate) != Some(report.gate) {
            match report.block_message {
                Some(message) => log::info!("Gate blocked: {}", message),
                None => log::info!("Gate permitted"),
            }
        }

        if last.as_ref() != Some(&report) {
            match report.to_json() {
                Ok(json) => println!("{}", json),
                Err(err) => {
                    log::error!("Cannot encode report: {}", err);
                    return ExitCode::FAILURE;
                }
            }
            last = Some(report);
        }

        if !opts.watch {
            break;
        }
        if !view.is_attached() {
            log::info!("Host detached, stopping");
            break;
        }
        std::thread::sleep(WATCH_INTERVAL);
    }

    ExitCode::SUCCESS
}

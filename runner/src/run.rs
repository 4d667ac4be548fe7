use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::{Duration, Instant};

use marquee_core::core::{ConfigFile, CpuId, Error, Machine, StateError};
use marquee_machines::registry::MachineEntry;
use tracing::info;

use crate::Cli;

/// Per-CPU totals after a run.
#[derive(Debug)]
pub struct Report {
    pub machine: String,
    pub frames: u64,
    pub emulated: Duration,
    pub wall: Duration,
    pub cpus: Vec<(CpuId, String, u64)>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let speed = if self.wall.is_zero() {
            0.0
        } else {
            self.emulated.as_secs_f64() / self.wall.as_secs_f64() * 100.0
        };
        writeln!(
            f,
            "{}: {} frames, {:.3}s emulated in {:.3}s ({speed:.0}%)",
            self.machine,
            self.frames,
            self.emulated.as_secs_f64(),
            self.wall.as_secs_f64()
        )?;
        for (cpu, name, cycles) in &self.cpus {
            writeln!(f, "  {cpu} {name:<6} {cycles} cycles")?;
        }
        Ok(())
    }
}

/// Config file (if any) with command-line overrides applied.
pub fn load_config(cli: &Cli) -> Result<ConfigFile, Error> {
    let mut file = match &cli.config {
        Some(path) => ConfigFile::from_toml_file(path)?,
        None => ConfigFile::default(),
    };
    if let Some(slices) = cli.slices {
        file.machine.slices_per_frame = slices;
        file.machine.validate()?;
    }
    Ok(file)
}

pub fn run(entry: &MachineEntry, cli: &Cli) -> Result<Report, Error> {
    let config = load_config(cli)?;
    let mut machine = (entry.create)(&config)?;
    info!(machine = entry.name, cpus = machine.cpu_count(), "machine created");

    if let Some(path) = &cli.load_state {
        let mut reader = BufReader::new(File::open(path).map_err(StateError::from)?);
        machine.load_state(&mut reader)?;
        info!(path = %path.display(), frame = machine.current_frame(), "state loaded");
    }

    let start = Instant::now();
    run_frames(machine.as_mut(), cli.frames, cli.throttle)?;
    let wall = start.elapsed();

    if let Some(path) = &cli.save_state {
        let mut writer = BufWriter::new(File::create(path).map_err(StateError::from)?);
        machine.save_state(&mut writer)?;
        info!(path = %path.display(), "state saved");
    }

    Ok(report(machine.as_ref(), cli.frames, wall))
}

fn run_frames(machine: &mut dyn Machine, frames: u64, throttle: bool) -> Result<(), Error> {
    let frame_time = Duration::from_secs_f64(1.0 / machine.frames_per_second());
    let start = Instant::now();
    for n in 0..frames {
        machine.run_frame()?;
        if throttle {
            let due = frame_time * (n + 1) as u32;
            if let Some(wait) = due.checked_sub(start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }
    Ok(())
}

fn report(machine: &dyn Machine, frames: u64, wall: Duration) -> Report {
    let cpus = (0..machine.cpu_count())
        .map(CpuId)
        .filter_map(|id| {
            let core = machine.cpu(id)?;
            let name = core.info(marquee_core::cpu::InfoField::Name);
            Some((id, name, machine.total_cycles(id)))
        })
        .collect();
    Report {
        machine: machine.name().to_string(),
        frames,
        emulated: Duration::from_secs_f64(frames as f64 / machine.frames_per_second()),
        wall,
        cpus,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use marquee_machines::registry;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("marquee").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn runs_requested_frames() {
        let entry = registry::find("soundlatch").unwrap();
        let report = run(entry, &cli(&["soundlatch", "--frames", "3"])).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(report.cpus.len(), 2);
        assert_eq!(report.cpus[0].1, "8085A");
        assert_eq!(report.cpus[1].1, "8080");
        assert!(report.cpus.iter().all(|(_, _, cycles)| *cycles > 0));
        assert!(report.to_string().starts_with("soundlatch: 3 frames"));
    }

    #[test]
    fn zero_slices_override_rejected() {
        let err = load_config(&cli(&["bankswitch", "--slices", "0"])).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(marquee_core::core::ConfigError::ZeroSlices)
        ));
    }

    #[test]
    fn save_then_load_continues_frame_count() {
        let dir = std::env::temp_dir().join(format!("marquee-runner-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bankswitch.state");
        let path_str = path.to_str().unwrap();
        let entry = registry::find("bankswitch").unwrap();

        run(entry, &cli(&["bankswitch", "--frames", "2", "--save-state", path_str])).unwrap();
        let report = run(entry, &cli(&["bankswitch", "--frames", "0", "--load-state", path_str])).unwrap();
        let first = report.cpus[0].2;
        assert!(first > 0, "restored cycle total carried over");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_state_file_is_error() {
        let entry = registry::find("bankswitch").unwrap();
        let err = run(entry, &cli(&["bankswitch", "--load-state", "/nonexistent/x.state"])).unwrap_err();
        assert!(matches!(err, Error::State(StateError::Io(_))));
    }
}

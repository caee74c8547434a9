use crate::algo::Coordinator;
use crate::data::deserialize;
use anyhow::{anyhow, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};
use std::fs::File;
use std::io::BufReader;

/// Report of running a directory of samples.
#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    workers: usize,
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Create a new report.
    const fn new(workers: usize) -> Self {
        let entries = Vec::new();
        Self { workers, entries }
    }

    /// Get the number of search workers used.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Get the entries.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Workers: {}", self.workers)?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        writeln!(f, "-------------------")
    }
}

/// Report of running a single sample.
#[non_exhaustive]
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub processors: usize,
    pub makespan: u64,
    pub time: f64,
}

impl Display for ReportEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{} on {}: {} in {:.2} sec",
            self.name, self.processors, self.makespan, self.time
        )
    }
}

/// Run all samples in the `samples` directory.
/// Print the report to stdout.
///
/// # Errors
/// - If a file cannot be read or scheduled.
/// - If no samples are found.
///
/// # Panics
/// - If the schedule is invalid.
/// - If the makespan differs from the one in the filename.
pub fn samples(workers: usize) -> anyhow::Result<()> {
    run("samples", true, workers).and_then(|report| {
        if report.entries.is_empty() {
            Err(anyhow!("No samples found"))
        } else {
            println!("{report}");
            Ok(())
        }
    })
}

/// Run all samples in the `dir` directory.
/// Files are named `{processors}_{makespan}_{name}.dot`, a makespan of 0 means unknown.
///
/// # Arguments
/// - `valid` is true, check if the makespan is optimal.
/// - `workers` is the number of search workers.
///
/// # Errors
/// - If a file cannot be read or scheduled.
///
/// # Panics
/// - If the schedule is invalid.
/// - If the makespan is incorrect.
pub fn run(dir: &str, valid: bool, workers: usize) -> anyhow::Result<Report> {
    let mut report = Report::new(workers);

    let mut files = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    files.sort_by_key(std::fs::DirEntry::file_name);

    for file in files {
        let (name, processors, expected) = parse_filename(&file.file_name())?;
        let graph = deserialize(&mut BufReader::new(File::open(file.path())?))?.graph;
        let coordinator = Coordinator::new(workers, processors)?;

        let time = std::time::Instant::now();
        let schedule = coordinator.schedule(&graph)?;
        let time = time.elapsed().as_secs_f64();

        assert!(schedule.verify(&graph, processors), "Invalid schedule created");

        let makespan = schedule.makespan();
        if valid && expected != 0 {
            assert_eq!(makespan, expected, "Invalid makespan {name}");
        }

        info!("{name}: makespan {makespan} in {time:.3} sec");
        report.entries.push(ReportEntry {
            name,
            processors,
            makespan,
            time,
        });
    }

    Ok(report)
}

fn parse_filename(filename: &std::ffi::OsString) -> anyhow::Result<(String, usize, u64)> {
    static NAME_ERR: &str = "Cannot read filename";

    let name = filename.to_str().ok_or_else(|| anyhow!(NAME_ERR))?;
    let stem = name.split('.').next().ok_or_else(|| anyhow!(NAME_ERR))?;
    let mut parts = stem.splitn(3, '_');
    let processors = parts.next().ok_or_else(|| anyhow!(NAME_ERR))?.parse()?;
    let makespan = parts.next().ok_or_else(|| anyhow!(NAME_ERR))?.parse()?;
    if parts.next().map_or(true, str::is_empty) {
        bail!(NAME_ERR);
    }
    Ok((name.into(), processors, makespan))
}

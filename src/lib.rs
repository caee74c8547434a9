#![deny(clippy::all, clippy::cargo, clippy::expect_used, clippy::unwrap_used)]
#![deny(clippy::pedantic, clippy::nursery, unsafe_code)]
#![warn(clippy::unimplemented, clippy::redundant_type_annotations)]

use anyhow::Result;
use log::info;
use std::io::{BufRead, Write};

pub mod algo;
pub mod core;
pub mod data;

/// Schedules the graph read from reader with the given coordinator and writes
/// the graph annotated with the placements to writer.
/// Returns the makespan of the schedule.
///
/// # Errors
/// - If the graph could not be read from the reader.
/// - If no schedule could be found.
/// - If the schedule could not be written to the writer.
///
/// # Panics
///  - If the schedule is invalid in debug mode.
pub fn run_reader(
    coordinator: &algo::Coordinator,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    format: data::Format,
) -> Result<u64> {
    let graph = data::deserialize(reader)?;
    info!("scheduling `{}` with {} tasks", graph.name, graph.graph.len());

    let schedule = coordinator.schedule(&graph.graph)?;

    debug_assert!(
        schedule.verify(&graph.graph, coordinator.processors()),
        "Schedule is invalid: {schedule:?}"
    );

    writeln!(writer, "{}", data::serialize(&graph, &schedule, format)?)?;

    Ok(schedule.makespan())
}

#[cfg(not(target_pointer_width = "64"))]
compile_error!("Must be 64-bit system!");

/// Casts the given value to `u64`.
/// It should never fail on 64-bit systems.
///
/// # Panics
/// - If the value cannot be cast to `usize`.
#[must_use]
pub fn cast_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| unreachable!("Must be 64-bit system!"))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn run_reader_should_write_schedule() -> Result<()> {
        let input = "digraph g {\n a [Weight=2];\n b [Weight=3];\n a -> b [Weight=1];\n}";
        let coordinator = algo::Coordinator::new(2, 2)?;
        let mut output = Vec::new();

        let makespan = run_reader(
            &coordinator,
            &mut Cursor::new(input),
            &mut output,
            data::Format::Dot,
        )?;

        assert_eq!(makespan, 5);
        let output = String::from_utf8(output)?;
        assert!(output.contains("\ta\t[Weight=2,Start=0,Processor=1];"));
        assert!(output.contains("\tb\t[Weight=3,Start=2,Processor=1];"));
        assert!(output.contains("\ta -> b\t[Weight=1];"));
        Ok(())
    }

    #[test]
    fn run_reader_should_reject_malformed_input() -> Result<()> {
        let coordinator = algo::Coordinator::new(1, 1)?;
        let mut output = Vec::new();
        let result = run_reader(
            &coordinator,
            &mut Cursor::new("digraph g {\n a -> b [Weight=1];\n}"),
            &mut output,
            data::Format::Json,
        );

        assert!(result.is_err());
        assert!(output.is_empty());
        Ok(())
    }
}

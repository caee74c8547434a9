mod generate;
mod run;

pub use generate::*;
pub use run::*;

use crate::core::{Edge, Schedule, Task, TaskGraph};
use ahash::{HashMap, HashMapExt};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::io::BufRead;

/// A task graph together with the name it was read with.
#[derive(Clone, Debug, Deserialize, Eq, Serialize, PartialEq)]
pub struct NamedGraph {
    pub name: String,
    #[serde(flatten)]
    pub graph: TaskGraph,
}

impl NamedGraph {
    /// Creates a new named graph.
    #[must_use]
    pub fn new(name: impl Into<String>, graph: TaskGraph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }
}

/// Output formats of a schedule.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    #[default]
    Dot,
    Json,
}

/// Reads a graph either in the DOT or the JSON format.
/// JSON is detected by a leading `{`.
///
/// # Errors
/// - If the reader fails.
/// - If the input is not a valid graph description.
pub fn deserialize(reader: &mut impl BufRead) -> Result<NamedGraph> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    if text.trim_start().starts_with('{') {
        Ok(serde_json::from_str(&text)?)
    } else {
        parse_dot(&text)
    }
}

/// Serializes the graph with the placements of the schedule in the given format.
///
/// # Errors
/// - If JSON serialization fails.
pub fn serialize(graph: &NamedGraph, schedule: &Schedule, format: Format) -> Result<String> {
    match format {
        Format::Dot => Ok(to_string(graph, Some(schedule))),
        Format::Json => to_json(graph, schedule),
    }
}

/// Writes the graph in the DOT format.
/// When a schedule is given, every placed task gets `Start` and `Processor` attributes.
#[must_use]
pub fn to_string(graph: &NamedGraph, schedule: Option<&Schedule>) -> String {
    let mut out = String::new();
    let tasks = graph.graph.tasks();

    let _ = writeln!(out, "digraph \"{}\" {{", graph.name.replace('"', "\\\""));
    for (id, task) in tasks.iter().enumerate() {
        let _ = write!(out, "\t{}\t[Weight={}", quote(&task.name), task.weight);
        if let Some(placement) = schedule.and_then(|schedule| schedule.placement(id)) {
            let _ = write!(out, ",Start={},Processor={}", placement.start, placement.processor);
        }
        out.push_str("];\n");
    }
    for edge in graph.graph.edges() {
        let _ = writeln!(
            out,
            "\t{} -> {}\t[Weight={}];",
            quote(&tasks[edge.from].name),
            quote(&tasks[edge.to].name),
            edge.weight
        );
    }
    out.push('}');

    out
}

#[derive(Serialize)]
struct ScheduledJson<'a> {
    name: &'a str,
    makespan: u64,
    tasks: Vec<TaskJson<'a>>,
    edges: Vec<EdgeJson<'a>>,
}

#[derive(Serialize)]
struct TaskJson<'a> {
    name: &'a str,
    weight: u64,
    processor: usize,
    start: u64,
}

#[derive(Serialize)]
struct EdgeJson<'a> {
    from: &'a str,
    to: &'a str,
    weight: u64,
}

/// Writes the schedule as JSON, with tasks in assignment order.
///
/// # Errors
/// - If serialization fails.
pub fn to_json(graph: &NamedGraph, schedule: &Schedule) -> Result<String> {
    let tasks = graph.graph.tasks();
    let json = ScheduledJson {
        name: &graph.name,
        makespan: schedule.makespan(),
        tasks: schedule
            .entries()
            .iter()
            .map(|entry| TaskJson {
                name: &tasks[entry.task].name,
                weight: tasks[entry.task].weight,
                processor: entry.processor,
                start: entry.start,
            })
            .collect(),
        edges: graph
            .graph
            .edges()
            .iter()
            .map(|edge| EdgeJson {
                from: &tasks[edge.from].name,
                to: &tasks[edge.to].name,
                weight: edge.weight,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

fn quote(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.into()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

fn unquote(name: &str) -> String {
    let name = name.trim();
    name.strip_prefix('"')
        .and_then(|name| name.strip_suffix('"'))
        .unwrap_or(name)
        .replace("\\\"", "\"")
}

/// Splits a statement into its head and the value of its `Weight` attribute.
fn split_statement(statement: &str) -> Result<(&str, u64)> {
    let (head, rest) = statement
        .split_once('[')
        .ok_or_else(|| anyhow!("missing attribute list"))?;
    let attributes = rest
        .rsplit_once(']')
        .map(|(attributes, _)| attributes)
        .ok_or_else(|| anyhow!("unterminated attribute list"))?;

    for attribute in attributes.split(',') {
        if let Some((key, value)) = attribute.split_once('=') {
            if key.trim().eq_ignore_ascii_case("weight") {
                let weight = unquote(value).parse().context("invalid weight")?;
                return Ok((head.trim(), weight));
            }
        }
    }

    bail!("missing Weight attribute")
}

/// Parses a directed graph in the DOT subset used for task graphs:
/// `a [Weight=2];` declares a task and `a -> b [Weight=1];` an edge.
fn parse_dot(text: &str) -> Result<NamedGraph> {
    let mut name = String::from("graph");
    let mut tasks = Vec::new();
    let mut ids = HashMap::new();
    let mut pending = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let number = number + 1;
        let line = line.split_once("//").map_or(line, |(code, _)| code).trim();

        if line.is_empty() || line == "}" || line == "{" {
            continue;
        }

        if let Some(header) = line.strip_prefix("digraph") {
            name = unquote(header.trim().trim_end_matches('{'));
            continue;
        }

        let statement = line.trim_end_matches(';');
        let (head, weight) =
            split_statement(statement).with_context(|| format!("line {number}: `{line}`"))?;

        if let Some((from, to)) = head.split_once("->") {
            pending.push((unquote(from), unquote(to), weight, number));
        } else {
            let task = unquote(head);
            if ids.insert(task.clone(), tasks.len()).is_some() {
                bail!("line {number}: task `{task}` is declared more than once");
            }
            tasks.push(Task::new(task, weight));
        }
    }

    let mut edges = Vec::with_capacity(pending.len());
    for (from, to, weight, number) in pending {
        let find = |task: &str| {
            ids.get(task)
                .copied()
                .ok_or_else(|| anyhow!("line {number}: unknown task `{task}`"))
        };
        edges.push(Edge::new(find(&from)?, find(&to)?, weight));
    }

    Ok(NamedGraph::new(name, TaskGraph::new(tasks, edges)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{diamond, Placement, RunState};
    use std::io::Cursor;

    const DIAMOND: &str = r#"digraph "example" {
	a	[Weight=2];
	b	[Weight=3];
	a -> b	[Weight=1];
	c	[Weight=3];
	a -> c	[Weight=2];
	d	[Weight=2];
	b -> d	[Weight=2];
	c -> d	[Weight=1];
}"#;

    fn schedule(graph: &TaskGraph) -> Schedule {
        let mut state = RunState::new(graph);
        for (task, processor, start) in [(0, 1, 0), (2, 1, 2), (1, 2, 3), (3, 2, 6)] {
            state.assign(task, Placement::new(processor, start));
        }
        Schedule::from_state(graph, &state)
    }

    #[test]
    fn dot_should_parse() -> anyhow::Result<()> {
        let named = deserialize(&mut Cursor::new(DIAMOND))?;

        assert_eq!(named.name, "example");
        assert_eq!(named.graph.len(), 4);
        assert_eq!(named.graph.edges()[1], Edge::new(0, 2, 2));
        assert_eq!(named.graph.weight(3), 2);
        assert_eq!(named.graph.total_weight(), diamond().total_weight());

        Ok(())
    }

    #[test]
    fn dot_should_write_placements() -> anyhow::Result<()> {
        let named = deserialize(&mut Cursor::new(DIAMOND))?;
        let output = to_string(&named, Some(&schedule(&named.graph)));

        let expected = "digraph \"example\" {\n\
                        \ta\t[Weight=2,Start=0,Processor=1];\n\
                        \tb\t[Weight=3,Start=3,Processor=2];\n\
                        \tc\t[Weight=3,Start=2,Processor=1];\n\
                        \td\t[Weight=2,Start=6,Processor=2];\n\
                        \ta -> b\t[Weight=1];\n\
                        \ta -> c\t[Weight=2];\n\
                        \tb -> d\t[Weight=2];\n\
                        \tc -> d\t[Weight=1];\n\
                        }";
        assert_eq!(output, expected);

        let reread = deserialize(&mut Cursor::new(output))?;
        assert_eq!(reread, named);

        Ok(())
    }

    #[test]
    fn dot_should_report_errors() {
        let unknown = "digraph g {\n a [Weight=1];\n a -> b [Weight=1];\n}";
        let error = deserialize(&mut Cursor::new(unknown)).err().map(|err| err.to_string());
        assert_eq!(error.as_deref(), Some("line 3: unknown task `b`"));

        let missing = "digraph g {\n a [Start=1];\n}";
        assert!(deserialize(&mut Cursor::new(missing)).is_err());

        let duplicate = "digraph g {\n a [Weight=1];\n a [Weight=2];\n}";
        assert!(deserialize(&mut Cursor::new(duplicate)).is_err());

        let zero = "digraph g {\n a [Weight=0];\n}";
        assert!(deserialize(&mut Cursor::new(zero)).is_err());
    }

    #[test]
    fn dot_should_handle_quotes_and_comments() -> anyhow::Result<()> {
        let text = "// generated\ndigraph g {\n \"task one\" [ Weight = 4 ];\n x [Weight=1]; // root\n \"task one\" -> x [Weight=3];\n}";
        let named = deserialize(&mut Cursor::new(text))?;

        assert_eq!(named.name, "g");
        assert_eq!(named.graph.task(0).name, "task one");
        assert_eq!(named.graph.edges(), &[Edge::new(0, 1, 3)]);
        assert!(to_string(&named, None).contains("\"task one\" -> x\t[Weight=3];"));

        Ok(())
    }

    #[test]
    fn json_should_read_and_write() -> anyhow::Result<()> {
        let text = r#"{"name": "tiny", "tasks": [{"name": "a", "weight": 2}, {"name": "b", "weight": 1}],
                      "edges": [{"from": 0, "to": 1, "weight": 4}]}"#;
        let named = deserialize(&mut Cursor::new(text))?;
        assert_eq!(named.graph.dependencies(1).collect::<Vec<_>>(), vec![0]);

        let mut state = RunState::new(&named.graph);
        state.assign(0, Placement::new(1, 0));
        state.assign(1, Placement::new(1, 2));
        let schedule = Schedule::from_state(&named.graph, &state);

        let json: serde_json::Value = serde_json::from_str(&to_json(&named, &schedule)?)?;
        assert_eq!(json["makespan"], 3);
        assert_eq!(json["tasks"][1]["name"], "b");
        assert_eq!(json["tasks"][1]["start"], 2);
        assert_eq!(json["edges"][0]["from"], "a");

        Ok(())
    }
}

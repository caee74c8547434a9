use super::Error;
use ahash::{HashSet, HashSetExt};
use serde::{Deserialize, Serialize};

/// A task. Contains the unique name of the task and its processing time.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct Task {
    pub name: String,
    pub weight: u64,
}

impl Task {
    /// Creates a new task.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: u64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// A precedence edge between two tasks described by their indices.
/// The weight is the communication cost paid when both ends run on different processors.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub weight: u64,
}

impl Edge {
    /// Creates a new edge from `from` to `to`.
    #[must_use]
    pub const fn new(from: usize, to: usize, weight: u64) -> Self {
        Self { from, to, weight }
    }

    /// Returns the communication cost of the edge when the ends run on the given processors.
    #[must_use]
    pub const fn cost(&self, from_processor: usize, to_processor: usize) -> u64 {
        if from_processor == to_processor {
            0
        } else {
            self.weight
        }
    }
}

/// Plain list of tasks and edges, used to (de)serialize a graph.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct GraphData {
    tasks: Vec<Task>,
    edges: Vec<Edge>,
}

/// A weighted task graph.
///
/// Tasks are stored in an arena and referenced by index, so the topology is
/// immutable and can be shared between search workers.
/// The graph is expected to be acyclic, which is not checked.
#[derive(Clone, Debug, Deserialize, Eq, Serialize, PartialEq)]
#[serde(try_from = "GraphData", into = "GraphData")]
pub struct TaskGraph {
    tasks: Vec<Task>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Creates a new task graph.
    ///
    /// # Errors
    /// - If two tasks have the same name.
    /// - If a task has zero weight.
    /// - If an edge refers to a task index out of range.
    /// - If the sum of all task and edge weights does not fit below `u64::MAX`.
    pub fn new(tasks: Vec<Task>, edges: Vec<Edge>) -> Result<Self, Error> {
        let mut names = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if task.weight == 0 {
                return Err(Error::ZeroWeight(task.name.clone()));
            }
            if !names.insert(task.name.as_str()) {
                return Err(Error::DuplicateTask(task.name.clone()));
            }
        }

        let mut outgoing = vec![Vec::new(); tasks.len()];
        let mut incoming = vec![Vec::new(); tasks.len()];

        for (id, edge) in edges.iter().enumerate() {
            for end in [edge.from, edge.to] {
                if end >= tasks.len() {
                    return Err(Error::UnknownTask(end));
                }
            }
            outgoing[edge.from].push(id);
            incoming[edge.to].push(id);
        }

        // Every start and finish time is bounded by this sum.
        let total = tasks
            .iter()
            .map(|task| task.weight)
            .chain(edges.iter().map(|edge| edge.weight))
            .try_fold(0, u64::checked_add);
        if !total.is_some_and(|total| total < u64::MAX) {
            return Err(Error::WeightOverflow);
        }

        Ok(Self {
            tasks,
            edges,
            outgoing,
            incoming,
        })
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether the graph has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns all tasks in input order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns all edges in input order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the ids of all tasks.
    #[must_use]
    pub fn task_ids(&self) -> std::ops::Range<usize> {
        0..self.tasks.len()
    }

    /// Returns the task with the given id.
    #[must_use]
    pub fn task(&self, task: usize) -> &Task {
        &self.tasks[task]
    }

    /// Returns the processing time of the given task.
    #[must_use]
    pub fn weight(&self, task: usize) -> u64 {
        self.tasks[task].weight
    }

    /// Returns the id of the task with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.name == name)
    }

    /// Returns the edges leaving the given task.
    pub fn outgoing(&self, task: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing[task].iter().map(|&edge| &self.edges[edge])
    }

    /// Returns the edges entering the given task.
    pub fn incoming(&self, task: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming[task].iter().map(|&edge| &self.edges[edge])
    }

    /// Returns the tasks that depend on the given task.
    pub fn dependents(&self, task: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing(task).map(|edge| edge.to)
    }

    /// Returns the tasks the given task depends on.
    pub fn dependencies(&self, task: usize) -> impl Iterator<Item = usize> + '_ {
        self.incoming(task).map(|edge| edge.from)
    }

    /// Returns the sum of all task weights.
    /// It is the makespan of running every task on a single processor.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.tasks.iter().map(|task| task.weight).sum()
    }
}

impl TryFrom<GraphData> for TaskGraph {
    type Error = Error;

    fn try_from(data: GraphData) -> Result<Self, Error> {
        Self::new(data.tasks, data.edges)
    }
}

impl From<TaskGraph> for GraphData {
    fn from(graph: TaskGraph) -> Self {
        Self {
            tasks: graph.tasks,
            edges: graph.edges,
        }
    }
}

//! Chain discovery
//!
//! Searches a task catalog for ordered sequences of distinct tasks where
//! each task's output satisfies the next task's required input.
//!
//! Pairwise compatibility is computed once per catalog (n² checks), then a
//! depth-first search extends partial chains only along compatible links.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::compat::{analyze_task_compatibility, CompatibilityResult, FieldMapping};
use crate::error::{Result, WeaveError};
use crate::schema::TaskDefinition;

/// Ordered tasks plus the field mappings justifying each link
///
/// `links[i]` holds the mappings from `tasks[i]` into `tasks[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskChain {
    pub tasks: Vec<TaskDefinition>,
    pub links: Vec<Vec<FieldMapping>>,
}

impl TaskChain {
    /// One-task chain (no links)
    pub fn single(task: TaskDefinition) -> Self {
        Self {
            tasks: vec![task],
            links: Vec::new(),
        }
    }

    /// Build a chain from an explicit task order, checking every link
    pub fn from_tasks(tasks: Vec<TaskDefinition>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(WeaveError::EmptyChain);
        }

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(WeaveError::DuplicateTask {
                    name: task.name.clone(),
                });
            }
        }

        let mut links = Vec::with_capacity(tasks.len() - 1);
        for pair in tasks.windows(2) {
            let result = analyze_task_compatibility(&pair[0], &pair[1]);
            if !result.compatible {
                return Err(WeaveError::IncompatibleLink {
                    producer: pair[0].name.clone(),
                    consumer: pair[1].name.clone(),
                    missing: result.missing_fields,
                });
            }
            links.push(result.field_mappings);
        }

        Ok(Self { tasks, links })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn first(&self) -> Option<&TaskDefinition> {
        self.tasks.first()
    }

    pub fn last(&self) -> Option<&TaskDefinition> {
        self.tasks.last()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }
}

// ============================================================================
// QUERY
// ============================================================================

/// Chain search parameters
#[derive(Debug, Clone, Default)]
pub struct ChainQuery {
    /// Number of tasks per chain (chains shorter than 2 are never returned)
    pub length: usize,
    /// Only chains whose first task has this name
    pub starts_with: Option<String>,
    /// Only chains whose last task has this name
    pub ends_with: Option<String>,
    /// Stop after this many chains
    pub limit: Option<usize>,
}

impl ChainQuery {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    pub fn starting_with(mut self, name: impl Into<String>) -> Self {
        self.starts_with = Some(name.into());
        self
    }

    pub fn ending_with(mut self, name: impl Into<String>) -> Self {
        self.ends_with = Some(name.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query against a catalog
    pub fn run(&self, tasks: &[TaskDefinition]) -> Vec<TaskChain> {
        if self.length < 2 || tasks.len() < 2 || self.limit == Some(0) {
            return Vec::new();
        }

        // Names are unique identifiers; later duplicates are ignored
        let mut names = HashSet::with_capacity(tasks.len());
        let catalog: Vec<&TaskDefinition> = tasks
            .iter()
            .filter(|t| names.insert(t.name.as_str()))
            .collect();

        if self.length > catalog.len() {
            return Vec::new();
        }

        let matrix = CompatibilityMatrix::build(&catalog);
        debug!(
            tasks = catalog.len(),
            compatible_pairs = matrix.compatible_pairs(),
            length = self.length,
            "Searching for task chains"
        );

        let mut search = Search {
            query: self,
            catalog: &catalog,
            matrix: &matrix,
            path: Vec::with_capacity(self.length),
            used: vec![false; catalog.len()],
            found: Vec::new(),
        };

        for start in 0..catalog.len() {
            if let Some(first) = &self.starts_with {
                if catalog[start].name != *first {
                    continue;
                }
            }
            if search.visit(start) {
                break;
            }
        }

        debug!(chains = search.found.len(), "Chain search complete");
        search.found
    }
}

/// All chains of `length` distinct, pairwise-compatible tasks
pub fn find_compatible_chains(tasks: &[TaskDefinition], length: usize) -> Vec<TaskChain> {
    ChainQuery::new(length).run(tasks)
}

// ============================================================================
// SEARCH
// ============================================================================

struct CompatibilityMatrix {
    cells: Vec<Vec<Option<CompatibilityResult>>>,
}

impl CompatibilityMatrix {
    fn build(catalog: &[&TaskDefinition]) -> Self {
        let cells = catalog
            .iter()
            .enumerate()
            .map(|(i, producer)| {
                catalog
                    .iter()
                    .enumerate()
                    .map(|(j, consumer)| {
                        if i == j {
                            return None;
                        }
                        let result = analyze_task_compatibility(producer, consumer);
                        result.compatible.then_some(result)
                    })
                    .collect()
            })
            .collect();
        Self { cells }
    }

    fn link(&self, from: usize, to: usize) -> Option<&CompatibilityResult> {
        self.cells[from][to].as_ref()
    }

    fn compatible_pairs(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

struct Search<'a> {
    query: &'a ChainQuery,
    catalog: &'a [&'a TaskDefinition],
    matrix: &'a CompatibilityMatrix,
    path: Vec<usize>,
    used: Vec<bool>,
    found: Vec<TaskChain>,
}

impl Search<'_> {
    /// Extend the current path with `index`. Returns true once the limit is hit.
    fn visit(&mut self, index: usize) -> bool {
        self.path.push(index);
        self.used[index] = true;

        let done = if self.path.len() == self.query.length {
            self.accept()
        } else {
            let mut done = false;
            for next in 0..self.catalog.len() {
                if self.used[next] || self.matrix.link(index, next).is_none() {
                    continue;
                }
                if self.visit(next) {
                    done = true;
                    break;
                }
            }
            done
        };

        self.used[index] = false;
        self.path.pop();
        done
    }

    fn accept(&mut self) -> bool {
        let last = self.path[self.path.len() - 1];
        if let Some(end) = &self.query.ends_with {
            if self.catalog[last].name != *end {
                return false;
            }
        }

        let tasks = self.path.iter().map(|&i| self.catalog[i].clone()).collect();
        let links = self
            .path
            .windows(2)
            .filter_map(|w| self.matrix.link(w[0], w[1]))
            .map(|r| r.field_mappings.clone())
            .collect();
        self.found.push(TaskChain { tasks, links });

        self.query.limit.is_some_and(|limit| self.found.len() >= limit)
    }
}

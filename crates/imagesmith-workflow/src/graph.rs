use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::WorkflowError;

/// Step dependency graph.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Step names in definition order.
  steps: Vec<String>,
  /// step -> steps that wait on it.
  adjacency: HashMap<String, Vec<String>>,
  /// step -> steps it waits on.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from step names and a step -> dependencies map.
  ///
  /// Fails if a dependency entry references an unknown step.
  pub fn new<'a>(
    steps: impl IntoIterator<Item = &'a String>,
    dependencies: &BTreeMap<String, Vec<String>>,
  ) -> Result<Self, WorkflowError> {
    let steps: Vec<String> = steps.into_iter().cloned().collect();
    let known: HashSet<&str> = steps.iter().map(|s| s.as_str()).collect();

    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for step in &steps {
      adjacency.entry(step.clone()).or_default();
      reverse_adjacency.entry(step.clone()).or_default();
    }

    for (step, upstream) in dependencies {
      if !known.contains(step.as_str()) {
        return Err(WorkflowError::UnknownStep { step: step.clone() });
      }
      for dependency in upstream {
        if !known.contains(dependency.as_str()) {
          return Err(WorkflowError::UnknownDependency {
            step: step.clone(),
            dependency: dependency.clone(),
          });
        }
        adjacency
          .entry(dependency.clone())
          .or_default()
          .push(step.clone());
        reverse_adjacency
          .entry(step.clone())
          .or_default()
          .push(dependency.clone());
      }
    }

    let graph = Self {
      steps,
      adjacency,
      reverse_adjacency,
    };
    graph.check_acyclic()?;
    Ok(graph)
  }

  /// Steps with no dependencies.
  pub fn entry_points(&self) -> Vec<&str> {
    self
      .steps
      .iter()
      .filter(|s| self.upstream(s).is_empty())
      .map(|s| s.as_str())
      .collect()
  }

  /// Steps that wait on `step`.
  pub fn downstream(&self, step: &str) -> &[String] {
    self
      .adjacency
      .get(step)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Steps `step` waits on.
  pub fn upstream(&self, step: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(step)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Steps not yet completed whose dependencies have all completed.
  pub fn ready(&self, completed: &HashSet<String>) -> Vec<String> {
    self
      .steps
      .iter()
      .filter(|s| !completed.contains(*s))
      .filter(|s| self.upstream(s).iter().all(|up| completed.contains(up)))
      .cloned()
      .collect()
  }

  /// Kahn's algorithm; whatever cannot be ordered is on or behind a cycle.
  fn check_acyclic(&self) -> Result<(), WorkflowError> {
    let mut pending: HashMap<&str, usize> = self
      .steps
      .iter()
      .map(|s| (s.as_str(), self.upstream(s).len()))
      .collect();
    let mut queue: Vec<&str> = self.entry_points();

    while let Some(step) = queue.pop() {
      pending.remove(step);
      for next in self.downstream(step) {
        if let Some(count) = pending.get_mut(next.as_str()) {
          *count -= 1;
          if *count == 0 {
            queue.push(next.as_str());
          }
        }
      }
    }

    if pending.is_empty() {
      return Ok(());
    }
    let mut steps: Vec<String> = pending.keys().map(|s| s.to_string()).collect();
    steps.sort();
    Err(WorkflowError::DependencyCycle { steps })
  }
}

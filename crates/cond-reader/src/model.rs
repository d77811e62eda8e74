use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// A named outcome attached to one subject for one root-to-leaf path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Condition {
    id: String,
}

impl Condition {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rendering used in participant views. Currently the bare id.
    pub fn readable(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One ordered list of conditions per subject row.
///
/// Rows are only ever appended: `add_row` opens a new row and every following
/// `add_condition` extends that row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Task {
    rows: Vec<Vec<Condition>>,
}

impl Task {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self) {
        self.rows.push(Vec::new());
    }

    pub fn add_condition(&mut self, condition: Condition) -> Result<()> {
        let row = self.rows.last_mut().ok_or(Error::NoOpenRow)?;
        row.push(condition);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<Condition>] {
        &self.rows
    }

    pub fn row(&self, participant: usize) -> Option<&[Condition]> {
        self.rows.get(participant).map(Vec::as_slice)
    }

    pub fn condition(&self, participant: usize, index: usize) -> Option<&Condition> {
        self.rows.get(participant)?.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `"{participant}:   a | b | c"`, or `None` if the row does not exist.
    pub fn participant_line(&self, participant: usize) -> Option<String> {
        let row = self.row(participant)?;
        let joined = row
            .iter()
            .map(Condition::readable)
            .collect::<Vec<_>>()
            .join(" | ");
        Some(format!("{}:   {}", participant, joined))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for participant in 0..self.rows.len() {
            if let Some(line) = self.participant_line(participant) {
                writeln!(f, "{}", line)?;
            }
            writeln!(f, "-----")?;
        }
        Ok(())
    }
}

/// Tasks in the order the caller added them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Experiment {
    tasks: Vec<Task>,
}

impl Experiment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Only the lines of each task that belong to `participant`.
    pub fn for_participant(&self, participant: usize) -> String {
        let mut out = format!("### Experiment for participant {} ###\n", participant);
        for (i, task) in self.tasks.iter().enumerate() {
            out.push_str(&format!("Task {}\n", i + 1));
            match task.participant_line(participant) {
                Some(line) => out.push_str(&line),
                None => out.push_str(&format!("{}:   (no row)", participant)),
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, task) in self.tasks.iter().enumerate() {
            writeln!(f, "Task {}", i + 1)?;
            writeln!(f, "{}", task)?;
        }
        Ok(())
    }
}

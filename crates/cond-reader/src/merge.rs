//! Depth-first, per-subject merge of a condition tree into a [`Task`].

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Condition, Task};
use crate::tree::{ConditionTree, ReadOptions};

/// Joins every label with `delimiter`.
pub fn join_with(delimiter: impl Into<String>) -> impl Fn(&[String]) -> String {
    let delimiter = delimiter.into();
    move |labels: &[String]| labels.join(&delimiter)
}

/// Configurable merger: join the first `take` labels (all when unset).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeRule {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub take: Option<usize>,
}

fn default_delimiter() -> String {
    "_".to_string()
}

impl Default for MergeRule {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            take: None,
        }
    }
}

impl MergeRule {
    pub fn apply(&self, labels: &[String]) -> String {
        let end = self.take.map_or(labels.len(), |n| n.min(labels.len()));
        labels[..end].join(&self.delimiter)
    }
}

/// Conditions for `subject` under `tree`. `prefix` holds the labels from the
/// root down to, but excluding, `tree`.
pub fn merge_tree<F>(
    subject: usize,
    tree: &ConditionTree,
    prefix: &[String],
    merger: &F,
) -> Result<Vec<Condition>>
where
    F: Fn(&[String]) -> String + ?Sized,
{
    let mut labels = prefix.to_vec();
    if let Some(label) = tree.label() {
        labels.push(label.to_string());
    }

    let ids = tree.table().row(subject)?;
    let mut conditions = Vec::new();
    match tree {
        ConditionTree::Leaf { .. } => {
            for id in ids {
                let mut path = labels.clone();
                path.push(id.clone());
                conditions.push(Condition::new(merger(&path)));
            }
        }
        ConditionTree::Branch { .. } => {
            for id in ids {
                let child = tree
                    .child(id)
                    .ok_or_else(|| Error::MissingBranch { label: id.clone() })?;
                conditions.extend(merge_tree(subject, child, &labels, merger)?);
            }
        }
    }
    Ok(conditions)
}

/// Reads the task rooted at `root`: one row per subject, conditions in
/// depth-first order of that subject's own identifier rows.
pub fn read_task<F>(
    root: &Path,
    num_lines: usize,
    separator: &str,
    collapse: bool,
    connector: &str,
    merger: F,
) -> Result<Task>
where
    F: Fn(&[String]) -> String,
{
    let options = ReadOptions::new(num_lines, separator, collapse, connector)?;
    read_task_with(root, &options, &merger)
}

pub fn read_task_with<F>(root: &Path, options: &ReadOptions, merger: &F) -> Result<Task>
where
    F: Fn(&[String]) -> String + ?Sized,
{
    if !root.is_dir() {
        return Err(Error::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let tree = ConditionTree::build(root, options)?;

    let mut task = Task::new();
    for subject in 0..options.num_lines {
        task.add_row();
        for condition in merge_tree(subject, &tree, &[], merger)? {
            task.add_condition(condition)?;
        }
    }
    debug!(
        root = %root.display(),
        subjects = options.num_lines,
        "read task"
    );
    Ok(task)
}

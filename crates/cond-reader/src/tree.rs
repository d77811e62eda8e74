//! Assembles the condition tree from level tables and folder names.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::level::{LevelDir, LevelTable, Separator};

/// Parameters shared by every level of one task.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Number of subject rows read from every level file.
    pub num_lines: usize,
    pub separator: Separator,
    /// Join the identifiers of leaf levels into one per row.
    pub collapse: bool,
    pub connector: String,
}

impl ReadOptions {
    pub fn new(num_lines: usize, separator: &str, collapse: bool, connector: &str) -> Result<Self> {
        Ok(Self {
            num_lines,
            separator: Separator::new(separator)?,
            collapse,
            connector: connector.to_string(),
        })
    }
}

/// `label` is the folder name that led to a node; the root has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionTree {
    Leaf {
        label: Option<String>,
        table: LevelTable,
    },
    Branch {
        label: Option<String>,
        table: LevelTable,
        children: Vec<ConditionTree>,
    },
}

impl ConditionTree {
    pub fn build(root: &Path, options: &ReadOptions) -> Result<Self> {
        read_node(None, root, options)
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Leaf { label, .. } | Self::Branch { label, .. } => label.as_deref(),
        }
    }

    pub fn table(&self) -> &LevelTable {
        match self {
            Self::Leaf { table, .. } | Self::Branch { table, .. } => table,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    pub fn children(&self) -> &[ConditionTree] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Branch { children, .. } => children,
        }
    }

    /// First child whose label equals `label`.
    pub fn child(&self, label: &str) -> Option<&ConditionTree> {
        self.children()
            .iter()
            .find(|child| child.label() == Some(label))
    }
}

fn read_node(label: Option<String>, dir: &Path, options: &ReadOptions) -> Result<ConditionTree> {
    let level = LevelDir::scan(dir)?;
    let table = LevelTable::read(&level.file, options.num_lines, &options.separator)?;

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    let candidates = table.identifiers();
    let has_identifiers = !candidates.is_empty();
    for id in candidates {
        match level.subdirs.get(&id) {
            Some(path) => matched.push((id, path.clone())),
            None => missing.push(id),
        }
    }

    if matched.is_empty() {
        let table = if options.collapse && has_identifiers {
            table.collapse(&options.connector)
        } else {
            table
        };
        debug!(
            dir = %dir.display(),
            label = label.as_deref().unwrap_or("<root>"),
            rows = table.rows.len(),
            "leaf level"
        );
        return Ok(ConditionTree::Leaf { label, table });
    }

    if !missing.is_empty() {
        return Err(Error::InconsistentStructure {
            dir: dir.to_path_buf(),
            matched: matched.into_iter().map(|(id, _)| id).collect(),
            missing,
        });
    }

    let mut children = Vec::with_capacity(matched.len());
    for (id, path) in matched {
        children.push(read_node(Some(id), &path, options)?);
    }
    debug!(
        dir = %dir.display(),
        label = label.as_deref().unwrap_or("<root>"),
        rows = table.rows.len(),
        children = children.len(),
        "branch level"
    );
    Ok(ConditionTree::Branch {
        label,
        table,
        children,
    })
}

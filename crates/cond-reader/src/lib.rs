//! Reads nested folders of identifier files into per-subject condition tables.
//!
//! Every folder level holds one `*.txt` file with one line per subject. A
//! line lists the identifiers that apply to that subject at this level; an
//! identifier that names a subfolder descends into it. Walking each subject's
//! rows depth-first and merging the labels along every root-to-leaf path
//! yields that subject's ordered list of [`Condition`]s.

pub mod config;
pub mod error;
pub mod level;
pub mod merge;
pub mod model;
pub mod tree;

pub use config::{read_experiment, ExperimentConfig, ExperimentReport, TaskConfig, TaskFailure};
pub use error::{Error, Result};
pub use level::{LevelTable, Separator};
pub use merge::{join_with, merge_tree, read_task, read_task_with, MergeRule};
pub use model::{Condition, Experiment, Task};
pub use tree::{ConditionTree, ReadOptions};

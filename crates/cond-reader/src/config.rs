//! YAML description of an experiment: which task folders to read and how.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::merge::{read_task_with, MergeRule};
use crate::model::Experiment;
use crate::tree::ReadOptions;

pub const DEFAULT_SEPARATOR: &str = " ";
pub const DEFAULT_CONNECTOR: &str = "-";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub version: String,
    #[serde(default)]
    pub experiment: ExperimentMeta,
    /// Default subject count for tasks that do not set their own.
    #[serde(default)]
    pub subjects: Option<usize>,
    pub tasks: Vec<TaskConfig>,
    /// Directory the config was loaded from; task paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub subjects: Option<usize>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub collapse: bool,
    #[serde(default = "default_connector")]
    pub connector: String,
    #[serde(default)]
    pub merge: MergeRule,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_connector() -> String {
    DEFAULT_CONNECTOR.to_string()
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_yaml(path, &raw, base_dir)
    }

    pub fn from_yaml(path: &Path, raw: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(raw).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        for (i, task) in self.tasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                problems.push(format!("/tasks/{}/name is empty", i));
            }
            match task.subjects.or(self.subjects) {
                None => problems.push(format!(
                    "/tasks/{}/subjects missing and no top-level default",
                    i
                )),
                Some(0) => problems.push(format!("/tasks/{}/subjects must be at least 1", i)),
                Some(_) => {}
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }

    pub fn task_root(&self, task: &TaskConfig) -> PathBuf {
        if task.path.is_absolute() {
            task.path.clone()
        } else {
            self.base_dir.join(&task.path)
        }
    }

    pub fn task_options(&self, task: &TaskConfig) -> Result<ReadOptions> {
        let num_lines = task.subjects.or(self.subjects).ok_or_else(|| {
            Error::Config(format!("task '{}' has no subject count", task.name))
        })?;
        ReadOptions::new(num_lines, &task.separator, task.collapse, &task.connector)
    }
}

/// A task that could not be read, kept alongside the ones that could.
#[derive(Debug)]
pub struct TaskFailure {
    pub name: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct ExperimentReport {
    pub experiment: Experiment,
    /// Names of the tasks in `experiment`, index-aligned with its tasks.
    pub task_names: Vec<String>,
    pub failures: Vec<TaskFailure>,
}

impl ExperimentReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The experiment, or the first failure.
    pub fn into_result(self) -> Result<Experiment> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.experiment),
        }
    }
}

/// Reads every configured task in order. A failing task does not stop the
/// others from being read.
pub fn read_experiment(config: &ExperimentConfig) -> ExperimentReport {
    let mut report = ExperimentReport::default();
    for task_config in &config.tasks {
        match read_configured_task(config, task_config) {
            Ok(task) => {
                debug!(task = %task_config.name, rows = task.len(), "task read");
                report.experiment.add_task(task);
                report.task_names.push(task_config.name.clone());
            }
            Err(err) => {
                error!(task = %task_config.name, error = %err, "task failed");
                report.failures.push(TaskFailure {
                    name: task_config.name.clone(),
                    error: err,
                });
            }
        }
    }
    report
}

fn read_configured_task(
    config: &ExperimentConfig,
    task: &TaskConfig,
) -> Result<crate::model::Task> {
    let options = config.task_options(task)?;
    let rule = task.merge.clone();
    let merger = move |labels: &[String]| rule.apply(labels);
    read_task_with(&config.task_root(task), &options, &merger)
}

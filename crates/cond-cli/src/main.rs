use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cond", version = "0.3.0", about = "Condition table reader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one task folder into a condition table.
    Read {
        dir: PathBuf,
        #[arg(long)]
        subjects: usize,
        #[arg(long, default_value = " ")]
        separator: String,
        #[arg(long)]
        collapse: bool,
        #[arg(long, default_value = "-")]
        connector: String,
        #[arg(long, default_value = "_")]
        delimiter: String,
        #[arg(long)]
        take: Option<usize>,
        #[arg(long)]
        participant: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Read every task listed in an experiment file.
    Run {
        experiment: PathBuf,
        #[arg(long)]
        participant: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Write a template experiment file.
    Init {
        #[arg(long, default_value = "experiment.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// Write a balanced Latin square for counterbalancing.
    LatinSquare {
        #[arg(long)]
        size: usize,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "results")]
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write one or more seeded random squares.
    RandomSquare {
        #[arg(long)]
        rows: usize,
        #[arg(long)]
        columns: usize,
        #[arg(long)]
        conditions: usize,
        #[arg(long)]
        seed: u64,
        #[arg(long)]
        avoid_repetition: bool,
        #[arg(long, default_value_t = 1)]
        files: usize,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "results")]
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            let failed = payload.get("ok") == Some(&Value::Bool(false));
            emit_json(&payload);
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                let code = err
                    .downcast_ref::<cond_reader::Error>()
                    .map(cond_reader::Error::code)
                    .unwrap_or("command_failed");
                emit_json(&json_error(code, err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("COND_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Read {
            dir,
            subjects,
            separator,
            collapse,
            connector,
            delimiter,
            take,
            participant,
            json,
        } => {
            let rule = cond_reader::MergeRule { delimiter, take };
            let task = cond_reader::read_task(
                &dir,
                subjects,
                &separator,
                collapse,
                &connector,
                move |labels: &[String]| rule.apply(labels),
            )?;
            if let Some(p) = participant {
                participant_row(&task, p)?;
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "read",
                    "dir": dir.display().to_string(),
                    "task": task_to_json(&task, participant),
                })));
            }
            match participant.and_then(|p| task.participant_line(p)) {
                Some(line) => println!("{}", line),
                None => print!("{}", task),
            }
        }
        Commands::Run {
            experiment,
            participant,
            json,
        } => {
            let config = cond_reader::ExperimentConfig::load(&experiment)?;
            let report = cond_reader::read_experiment(&config);
            if json {
                let tasks: Vec<Value> = report
                    .task_names
                    .iter()
                    .zip(report.experiment.tasks())
                    .map(|(name, task)| {
                        json!({ "name": name, "task": task_to_json(task, participant) })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": report.is_complete(),
                    "command": "run",
                    "experiment": config.experiment.id,
                    "tasks": tasks,
                    "failures": failures_to_json(&report.failures),
                })));
            }
            if !config.experiment.id.is_empty() {
                println!("experiment: {}", config.experiment.id);
            }
            match participant {
                Some(p) => print!("{}", report.experiment.for_participant(p)),
                None => print!("{}", report.experiment),
            }
            if !report.is_complete() {
                for failure in &report.failures {
                    eprintln!("task {} failed: {}", failure.name, failure.error);
                }
                anyhow::bail!(
                    "{} of {} tasks failed",
                    report.failures.len(),
                    config.tasks.len()
                );
            }
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(format!(
                    "init file already exists (use --force): {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&path, EXPERIMENT_TEMPLATE)?;
            println!("wrote: {}", path.display());
            println!(
                "next: edit {} \u{2014} fill in subjects and task paths, then run: cond run {}",
                path.display(),
                path.display()
            );
        }
        Commands::LatinSquare {
            size,
            name,
            dir,
            json,
        } => {
            let square = cond_squares::balanced_latin_square(size);
            let path = cond_squares::write_square(&dir, &name, &square)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "latin-square",
                    "files": [path.display().to_string()],
                    "rows": square.len(),
                })));
            }
            println!("wrote: {}", path.display());
        }
        Commands::RandomSquare {
            rows,
            columns,
            conditions,
            seed,
            avoid_repetition,
            files,
            name,
            dir,
            json,
        } => {
            let written = write_random_squares(
                &dir,
                &name,
                files,
                seed,
                (rows, columns, conditions),
                avoid_repetition,
            )?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "random-square",
                    "files": written
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>(),
                    "seed": seed,
                })));
            }
            for path in written {
                println!("wrote: {}", path.display());
            }
        }
    }
    Ok(None)
}

/// `files` squares named `name1.txt`, `name2.txt`, ... from one seeded generator.
fn write_random_squares(
    dir: &Path,
    name: &str,
    files: usize,
    seed: u64,
    (rows, columns, conditions): (usize, usize, usize),
    avoid_repetition: bool,
) -> Result<Vec<PathBuf>> {
    let mut rng = cond_squares::seeded_rng(seed);
    let mut written = Vec::with_capacity(files);
    for i in 0..files {
        let square =
            cond_squares::random_square(rows, columns, conditions, &mut rng, avoid_repetition)?;
        written.push(cond_squares::write_square(
            dir,
            &numbered_file_name(name, i + 1),
            &square,
        )?);
    }
    Ok(written)
}

/// `name` without one trailing `.txt`, followed by `index`.
fn numbered_file_name(name: &str, index: usize) -> String {
    let stem = name
        .strip_suffix(cond_squares::SQUARE_FILE_SUFFIX)
        .unwrap_or(name);
    format!("{}{}", stem, index)
}

fn participant_row(task: &cond_reader::Task, participant: usize) -> Result<&[cond_reader::Condition]> {
    task.row(participant).ok_or_else(|| {
        anyhow::anyhow!(
            "participant {} out of range ({} rows)",
            participant,
            task.len()
        )
    })
}

const EXPERIMENT_TEMPLATE: &str = "\
version: '1'
experiment:
  id: ''
  name: ''
subjects: 1                           # REQUIRED (>= 1): rows read from every level file
tasks:
  - name: Task1
    path: Task1                       # folder relative to this file
    separator: ' '                    # regular expression
    collapse: false                   # join leaf identifiers per subject
    connector: '-'
    merge:
      delimiter: '_'
      # take: 3                       # only the first N labels of each path
";

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Read { json, .. }
        | Commands::Run { json, .. }
        | Commands::LatinSquare { json, .. }
        | Commands::RandomSquare { json, .. } => *json,
        Commands::Init { .. } => false,
    }
}

fn task_to_json(task: &cond_reader::Task, participant: Option<usize>) -> Value {
    match participant {
        Some(p) => json!({ "participant": p, "conditions": task.row(p) }),
        None => json!({ "rows": task.rows() }),
    }
}

fn failures_to_json(failures: &[cond_reader::TaskFailure]) -> Value {
    failures
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "code": f.error.code(),
                "message": f.error.to_string(),
            })
        })
        .collect()
}

//! One directory level: its identifier file and its immediate subfolders.
//!
//! Parsing here is purely tabular. Matching identifiers against folder names
//! happens in [`crate::tree`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const LEVEL_FILE_SUFFIX: &str = ".txt";
pub const COMMENT_MARKER: char = '#';

/// Field separator for identifier lines, interpreted as a regular expression.
#[derive(Debug, Clone)]
pub struct Separator {
    regex: Regex,
}

impl Separator {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidSeparator {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Trimmed, non-empty tokens of `line`, in order.
    pub fn split(&self, line: &str) -> Vec<String> {
        self.regex
            .split(line.trim())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Lines that are neither blank nor comments.
pub fn usable_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !line.trim_start().starts_with(COMMENT_MARKER)
        })
        .collect()
}

/// Per-subject identifier lists parsed from one level file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelTable {
    pub rows: Vec<Vec<String>>,
}

impl LevelTable {
    /// Keeps the first `num_lines` usable lines; the rest are ignored.
    pub fn parse(path: &Path, text: &str, num_lines: usize, separator: &Separator) -> Result<Self> {
        let lines = usable_lines(text);
        if lines.len() < num_lines {
            return Err(Error::InsufficientRows {
                path: path.to_path_buf(),
                expected: num_lines,
                found: lines.len(),
            });
        }
        let rows = lines
            .into_iter()
            .take(num_lines)
            .map(|line| separator.split(line))
            .collect();
        Ok(Self { rows })
    }

    pub fn read(path: &Path, num_lines: usize, separator: &Separator) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text, num_lines, separator)
    }

    pub fn row(&self, subject: usize) -> Result<&[String]> {
        self.rows
            .get(subject)
            .map(Vec::as_slice)
            .ok_or(Error::SubjectOutOfRange {
                subject,
                rows: self.rows.len(),
            })
    }

    /// Distinct identifiers over all rows, in order of first appearance.
    pub fn identifiers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in self.rows.iter().flatten() {
            if seen.insert(id.as_str()) {
                out.push(id.clone());
            }
        }
        out
    }

    /// Joins each row into a single identifier. An empty row becomes `[""]`.
    pub fn collapse(self, connector: &str) -> Self {
        let rows = self
            .rows
            .into_iter()
            .map(|row| vec![row.join(connector)])
            .collect();
        Self { rows }
    }
}

/// Directory listing for one level.
#[derive(Debug, Clone)]
pub struct LevelDir {
    pub path: PathBuf,
    pub file: PathBuf,
    pub subdirs: BTreeMap<String, PathBuf>,
}

impl LevelDir {
    /// Lists the immediate entries of `dir`, sorted by name.
    ///
    /// The identifier file is the first `*.txt` file in that order.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        let mut subdirs = BTreeMap::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => match err.path().filter(|path| is_broken_link(path)) {
                    Some(path) => {
                        warn!(path = %path.display(), "skipping broken symlink");
                        continue;
                    }
                    None => return Err(err.into()),
                },
            };
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if entry.file_type().is_dir() {
                subdirs.insert(name.to_string(), entry.path().to_path_buf());
            } else if entry.file_type().is_file() && name.ends_with(LEVEL_FILE_SUFFIX) {
                files.push(entry.path().to_path_buf());
            }
        }

        let mut files = files.into_iter();
        let file = files.next().ok_or_else(|| Error::NoIdentifierFile {
            dir: dir.to_path_buf(),
        })?;
        let ignored: Vec<PathBuf> = files.collect();
        if !ignored.is_empty() {
            warn!(
                dir = %dir.display(),
                used = %file.display(),
                ignored = ?ignored,
                "multiple identifier files; using the first by name"
            );
        }

        Ok(Self {
            path: dir.to_path_buf(),
            file,
            subdirs,
        })
    }
}

fn is_broken_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
        && fs::metadata(path).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> Separator {
        Separator::new(" ").expect("separator")
    }

    #[test]
    fn usable_lines_skip_comments_and_blanks() {
        let text = "# header\n\n  1 2\n   # indented comment\n\t\n3 4\n";
        assert_eq!(usable_lines(text), vec!["  1 2", "3 4"]);
    }

    #[test]
    fn split_trims_and_drops_empty_tokens() {
        assert_eq!(space().split("  a   b c  "), vec!["a", "b", "c"]);
    }

    #[test]
    fn separator_is_a_regex() {
        let sep = Separator::new(r"[,;]").expect("separator");
        assert_eq!(sep.split("a, b;c ,, d"), vec!["a", "b", "c", "d"]);
        let err = Separator::new("(").expect_err("unbalanced group");
        assert!(matches!(err, Error::InvalidSeparator { .. }));
    }

    #[test]
    fn parse_keeps_first_rows_and_reports_shortfall() {
        let path = Path::new("cond.txt");
        let table = LevelTable::parse(path, "a b\nb\nc\n", 2, &space()).expect("table");
        assert_eq!(table.rows, vec![vec!["a", "b"], vec!["b"]]);

        let err = LevelTable::parse(path, "a\n# b\n", 2, &space()).expect_err("short");
        match err {
            Error::InsufficientRows {
                expected, found, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn identifiers_follow_first_appearance() {
        let table = LevelTable {
            rows: vec![
                vec!["B".into(), "A".into()],
                vec!["C".into(), "B".into()],
            ],
        };
        assert_eq!(table.identifiers(), vec!["B", "A", "C"]);
    }

    #[test]
    fn collapse_joins_rows() {
        let table = LevelTable {
            rows: vec![
                vec!["1".into(), "2".into(), "3".into()],
                vec![],
                vec!["4".into()],
            ],
        };
        let collapsed = table.collapse("-");
        assert_eq!(
            collapsed.rows,
            vec![vec!["1-2-3"], vec![""], vec!["4"]]
        );
    }

    #[test]
    fn row_out_of_range_is_an_error() {
        let table = LevelTable {
            rows: vec![vec!["a".into()]],
        };
        assert!(table.row(0).is_ok());
        assert!(matches!(
            table.row(3),
            Err(Error::SubjectOutOfRange {
                subject: 3,
                rows: 1
            })
        ));
    }

    #[test]
    fn scan_picks_first_txt_and_lists_subdirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "x\n").expect("write");
        fs::write(dir.path().join("a.txt"), "y\n").expect("write");
        fs::write(dir.path().join("notes.md"), "z\n").expect("write");
        fs::create_dir(dir.path().join("A")).expect("mkdir");

        let level = LevelDir::scan(dir.path()).expect("scan");
        assert_eq!(level.file, dir.path().join("a.txt"));
        assert_eq!(level.subdirs.keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_broken_symlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("cond.txt"), "1 2\n").expect("write");
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("stale_link"))
            .expect("symlink");

        let level = LevelDir::scan(dir.path()).expect("scan");
        assert_eq!(level.file, dir.path().join("cond.txt"));
        assert!(level.subdirs.is_empty());
    }

    #[test]
    fn scan_rejects_missing_file_and_non_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("A")).expect("mkdir");
        assert!(matches!(
            LevelDir::scan(dir.path()),
            Err(Error::NoIdentifierFile { .. })
        ));

        let file = dir.path().join("cond.txt");
        fs::write(&file, "a\n").expect("write");
        assert!(matches!(
            LevelDir::scan(&file),
            Err(Error::NotADirectory { .. })
        ));
    }
}

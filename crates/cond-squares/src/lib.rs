//! Generators for counterbalancing squares.
//!
//! The output files use the same one-row-per-subject text layout that
//! `cond-reader` parses, so a generated square can be dropped straight into a
//! task folder.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

pub const SQUARE_FILE_SUFFIX: &str = ".txt";

/// Rows of 1-based condition numbers.
pub type Square = Vec<Vec<usize>>;

#[derive(Debug, Error)]
pub enum SquareError {
    #[error("number of conditions must be at least 1")]
    ZeroConditions,

    #[error(
        "cannot avoid repetitions: {columns} columns but only {conditions} conditions"
    )]
    RepetitionImpossible { columns: usize, conditions: usize },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Balanced Latin square over `size` conditions.
///
/// The first row is `1, 2, n, 3, n-1, ...`; each further row adds one to every
/// entry, wrapping `n + 1` back to `1`. Odd sizes cannot balance first-order
/// carryover on their own, so the mirrored rows are appended (`2n` rows).
pub fn balanced_latin_square(size: usize) -> Square {
    if size == 0 {
        return Vec::new();
    }

    let mut first = Vec::with_capacity(size);
    let mut forward = 2;
    let mut backward = 0;
    for i in 0..size {
        if i == 0 {
            first.push(1);
        } else if i % 2 != 0 {
            first.push(forward);
            forward += 1;
        } else {
            first.push(size - backward);
            backward += 1;
        }
    }

    let mut square = Vec::with_capacity(size * 2);
    square.push(first);
    for i in 1..size {
        let next = square[i - 1]
            .iter()
            .map(|&v| if v + 1 > size { 1 } else { v + 1 })
            .collect();
        square.push(next);
    }

    if size % 2 != 0 {
        let mirrored: Vec<Vec<usize>> = square
            .iter()
            .map(|row| row.iter().rev().copied().collect())
            .collect();
        square.extend(mirrored);
    }
    square
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `rows x columns` entries drawn uniformly from `1..=conditions`.
pub fn random_square<R: Rng + ?Sized>(
    rows: usize,
    columns: usize,
    conditions: usize,
    rng: &mut R,
    avoid_repetition: bool,
) -> Result<Square, SquareError> {
    if conditions == 0 {
        return Err(SquareError::ZeroConditions);
    }
    if avoid_repetition && columns > conditions {
        return Err(SquareError::RepetitionImpossible {
            columns,
            conditions,
        });
    }

    let mut square = Vec::with_capacity(rows);
    for _ in 0..rows {
        let mut row: Vec<usize> = Vec::with_capacity(columns);
        while row.len() < columns {
            let value = rng.gen_range(1..=conditions);
            if avoid_repetition && row.contains(&value) {
                continue;
            }
            row.push(value);
        }
        square.push(row);
    }
    Ok(square)
}

/// One line per row, entries separated by a single space.
pub fn render(square: &Square) -> String {
    let mut out = String::new();
    for row in square {
        let line = row
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn square_file_name(name: &str) -> String {
    if name.ends_with(SQUARE_FILE_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, SQUARE_FILE_SUFFIX)
    }
}

/// Writes `square` to `dir/<name>.txt`, creating `dir` and replacing any
/// existing file.
pub fn write_square(dir: &Path, name: &str, square: &Square) -> Result<PathBuf, SquareError> {
    fs::create_dir_all(dir).map_err(|source| SquareError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(square_file_name(name));
    fs::write(&path, render(square)).map_err(|source| SquareError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), rows = square.len(), "wrote square");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn is_latin_row(row: &[usize], size: usize) -> bool {
        let values: HashSet<_> = row.iter().copied().collect();
        values.len() == size && values.iter().all(|&v| (1..=size).contains(&v))
    }

    #[test]
    fn even_latin_square_matches_known_layout() {
        let square = balanced_latin_square(4);
        assert_eq!(
            square,
            vec![
                vec![1, 2, 4, 3],
                vec![2, 3, 1, 4],
                vec![3, 4, 2, 1],
                vec![4, 1, 3, 2],
            ]
        );
    }

    #[test]
    fn odd_latin_square_appends_mirror() {
        let square = balanced_latin_square(3);
        assert_eq!(square.len(), 6);
        assert_eq!(square[0], vec![1, 2, 3]);
        assert_eq!(square[3], vec![3, 2, 1]);
        assert!(square.iter().all(|row| is_latin_row(row, 3)));
    }

    #[test]
    fn even_latin_square_is_first_order_balanced() {
        let size = 6;
        let square = balanced_latin_square(size);
        let mut pairs = HashSet::new();
        for row in &square {
            assert!(is_latin_row(row, size));
            for pair in row.windows(2) {
                assert!(pairs.insert((pair[0], pair[1])), "pair repeated: {:?}", pair);
            }
        }
        assert_eq!(pairs.len(), size * (size - 1));
    }

    #[test]
    fn empty_and_single_squares() {
        assert!(balanced_latin_square(0).is_empty());
        assert_eq!(balanced_latin_square(1), vec![vec![1], vec![1]]);
    }

    #[test]
    fn random_square_is_seeded_and_bounded() {
        let a = random_square(5, 4, 6, &mut seeded_rng(7), false).expect("square");
        let b = random_square(5, 4, 6, &mut seeded_rng(7), false).expect("square");
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert!(a.iter().all(|row| row.len() == 4));
        assert!(a.iter().flatten().all(|&v| (1..=6).contains(&v)));
    }

    #[test]
    fn random_square_can_avoid_repetition() {
        let square = random_square(20, 4, 4, &mut seeded_rng(1), true).expect("square");
        assert!(square.iter().all(|row| is_latin_row(row, 4)));
    }

    #[test]
    fn random_square_rejects_impossible_requests() {
        assert!(matches!(
            random_square(1, 1, 0, &mut seeded_rng(1), false),
            Err(SquareError::ZeroConditions)
        ));
        assert!(matches!(
            random_square(1, 5, 4, &mut seeded_rng(1), true),
            Err(SquareError::RepetitionImpossible {
                columns: 5,
                conditions: 4
            })
        ));
    }

    #[test]
    fn write_square_appends_suffix_and_renders_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("results");
        let path = write_square(&out, "latin4", &balanced_latin_square(4)).expect("write");
        assert_eq!(path, out.join("latin4.txt"));
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "1 2 4 3\n2 3 1 4\n3 4 2 1\n4 1 3 2\n");

        let again = write_square(&out, "latin4.txt", &vec![vec![1]]).expect("overwrite");
        assert_eq!(again, path);
        assert_eq!(fs::read_to_string(&path).expect("read"), "1\n");
    }
}

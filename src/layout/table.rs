//! Table-row detection from text alignment.
//!
//! Runs are grouped into visual rows; a row whose runs fall into several
//! well-separated x-clusters is a candidate. Consecutive candidates whose
//! clusters line up form a table, and each of their rows becomes a
//! table-row block. This is a block-level heuristic, not cell extraction.

use std::cmp::Ordering;

use crate::model::TextRun;

use super::LayoutConfig;

/// A visual row of runs sharing a narrow vertical band.
#[derive(Debug, Clone)]
struct RowData {
    runs: Vec<TextRun>,
    center_y: f32,
    font_size: f32,
}

/// Horizontal extent of a cell cluster.
#[derive(Debug, Clone, Copy)]
struct Cluster {
    x0: f32,
    x1: f32,
}

/// Split runs into table rows and the remaining flowing runs.
///
/// Table rows are returned top to bottom with runs ordered by x; remaining
/// runs keep their extraction order.
pub fn detect_table_rows(runs: Vec<TextRun>, config: &LayoutConfig) -> (Vec<Vec<TextRun>>, Vec<TextRun>) {
    if runs.len() < config.min_table_columns * config.min_table_rows {
        return (vec![], runs);
    }

    let rows = group_into_rows(runs, config);
    let clusters: Vec<Vec<Cluster>> = rows.iter().map(|r| cluster_row(r, config)).collect();
    let is_candidate: Vec<bool> = clusters
        .iter()
        .map(|c| c.len() >= config.min_table_columns)
        .collect();

    let mut in_table = vec![false; rows.len()];
    let mut chain_start = 0;
    for i in 0..=rows.len() {
        let continues = i < rows.len()
            && is_candidate[i]
            && (i == chain_start || aligned(&clusters[i - 1], &clusters[i]));
        if continues {
            continue;
        }
        let chain_len = i - chain_start;
        if chain_len >= config.min_table_rows && is_candidate[chain_start] {
            log::debug!(
                "Table rows {}..{} detected ({} cells)",
                chain_start,
                i,
                clusters[chain_start].len()
            );
            for flag in &mut in_table[chain_start..i] {
                *flag = true;
            }
        }
        // A candidate that broke alignment may open the next chain.
        chain_start = if i < rows.len() && is_candidate[i] { i } else { i + 1 };
    }

    let mut table_rows = Vec::new();
    let mut rest = Vec::new();
    for (row, table) in rows.into_iter().zip(in_table) {
        if table {
            table_rows.push(row.runs);
        } else {
            rest.extend(row.runs);
        }
    }
    rest.sort_by_key(|r| r.id);
    (table_rows, rest)
}

fn group_into_rows(mut runs: Vec<TextRun>, config: &LayoutConfig) -> Vec<RowData> {
    runs.sort_by(|a, b| {
        a.bbox
            .center_y()
            .partial_cmp(&b.bbox.center_y())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut rows: Vec<RowData> = Vec::new();
    for run in runs {
        let center = run.bbox.center_y();
        match rows.last_mut() {
            Some(row)
                if (center - row.center_y).abs()
                    <= config.row_tolerance * row.font_size.max(run.font_size) =>
            {
                row.font_size = row.font_size.max(run.font_size);
                row.runs.push(run);
            }
            _ => rows.push(RowData {
                center_y: center,
                font_size: run.font_size,
                runs: vec![run],
            }),
        }
    }

    for row in &mut rows {
        row.runs.sort_by(|a, b| {
            a.bbox
                .x0
                .partial_cmp(&b.bbox.x0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
    rows
}

fn cluster_row(row: &RowData, config: &LayoutConfig) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for run in &row.runs {
        match clusters.last_mut() {
            Some(last) if run.bbox.x0 - last.x1 < config.min_cell_gap => {
                last.x1 = last.x1.max(run.bbox.x1);
            }
            _ => clusters.push(Cluster {
                x0: run.bbox.x0,
                x1: run.bbox.x1,
            }),
        }
    }
    clusters
}

/// Rows align when they have the same number of cells and at least half of
/// the cells overlap horizontally with their counterpart.
fn aligned(a: &[Cluster], b: &[Cluster]) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    let overlapping = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.x0 <= y.x1 && y.x0 <= x.x1)
        .count();
    overlapping * 2 >= a.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, RunId};

    fn run(id: u32, text: &str, x0: f32, x1: f32, y: f32) -> TextRun {
        TextRun {
            id: RunId(id),
            page: 0,
            bbox: BoundingBox::new(x0, y, x1, y + 10.0),
            text: text.to_string(),
            font_size: 10.0,
            font_name: "Helvetica".to_string(),
            baseline: y + 10.0,
        }
    }

    fn statement_rows() -> Vec<TextRun> {
        let mut runs = vec![run(0, "Account summary", 72.0, 200.0, 60.0)];
        let mut id = 1;
        for (i, (date, desc, amount)) in [
            ("01/03/2023", "Opening balance", "1,000.00"),
            ("05/03/2023", "Card payment", "-45.20"),
            ("09/03/2023", "Salary", "2,500.00"),
        ]
        .iter()
        .enumerate()
        {
            let y = 100.0 + i as f32 * 14.0;
            runs.push(run(id, date, 72.0, 130.0, y));
            runs.push(run(id + 1, desc, 180.0, 300.0, y));
            runs.push(run(id + 2, amount, 450.0, 500.0, y));
            id += 3;
        }
        runs
    }

    #[test]
    fn test_detects_aligned_rows() {
        let (rows, rest) = detect_table_rows(statement_rows(), &LayoutConfig::default());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[0][0].text, "01/03/2023");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].text, "Account summary");
    }

    #[test]
    fn test_single_candidate_row_is_not_a_table() {
        let runs = vec![
            run(0, "Name", 72.0, 110.0, 100.0),
            run(1, "Date", 200.0, 240.0, 100.0),
            run(2, "Total", 400.0, 440.0, 100.0),
            run(3, "A plain paragraph line follows here", 72.0, 440.0, 114.0),
            run(4, "and continues on", 72.0, 300.0, 128.0),
        ];
        let (rows, rest) = detect_table_rows(runs, &LayoutConfig::default());
        assert!(rows.is_empty());
        assert_eq!(rest.len(), 5);
    }

    #[test]
    fn test_two_cluster_rows_are_left_to_columns() {
        let runs: Vec<_> = (0..6)
            .flat_map(|i| {
                let y = 100.0 + i as f32 * 14.0;
                vec![
                    run(i * 2, "left", 72.0, 280.0, y),
                    run(i * 2 + 1, "right", 320.0, 540.0, y),
                ]
            })
            .collect();
        let (rows, rest) = detect_table_rows(runs, &LayoutConfig::default());
        assert!(rows.is_empty());
        assert_eq!(rest.len(), 12);
        assert!(rest.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_words_close_together_form_one_cell() {
        let row = RowData {
            runs: vec![
                run(0, "Opening", 72.0, 110.0, 0.0),
                run(1, "balance", 113.0, 150.0, 0.0),
                run(2, "100.00", 300.0, 340.0, 0.0),
            ],
            center_y: 5.0,
            font_size: 10.0,
        };
        let clusters = cluster_row(&row, &LayoutConfig::default());
        assert_eq!(clusters.len(), 2);
    }
}

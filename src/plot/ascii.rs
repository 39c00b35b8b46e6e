//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output:
//! - daily values per 100k: `.`
//! - 7-day average: `-` line
//! - policy markers under the x axis: `^` start, `v` stop, `*` both

use chrono::NaiveDate;

use crate::domain::{CaseRecord, PolicyRecord, StartStop};

/// Which pair of columns to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Cases,
    Deaths,
}

impl Measure {
    pub fn label(self) -> &'static str {
        match self {
            Measure::Cases => "cases",
            Measure::Deaths => "deaths",
        }
    }

    /// `(daily, 7-day average)` per 100k.
    pub fn values(self, row: &CaseRecord) -> (f64, f64) {
        match self {
            Measure::Cases => (row.new_cases_1e6, row.new_cases_7day_1e6),
            Measure::Deaths => (row.new_deaths_1e6, row.new_deaths_7day_1e6),
        }
    }
}

/// Render daily rows (sorted by date) with policy markers.
pub fn render_case_plot(
    title: &str,
    rows: &[CaseRecord],
    policies: &[&PolicyRecord],
    measure: Measure,
    width: usize,
    height: usize,
) -> String {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return format!("{title}\nNo data to plot.\n");
    };
    let width = width.max(10);
    let height = height.max(5);
    let span = (last.date - first.date).num_days().max(1) as f64;
    let x_of = |d: NaiveDate| map_x((d - first.date).num_days() as f64, 0.0, span, width);

    let values: Vec<(usize, f64, f64)> = rows
        .iter()
        .map(|r| {
            let (daily, avg) = measure.values(r);
            (x_of(r.date), daily, avg)
        })
        .collect();
    let (y_min, y_max) = y_range(&values);
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    for &(x, daily, _) in &values {
        grid[map_y(daily, y_min, y_max, height)][x] = '.';
    }
    let mut prev = None;
    for &(x, _, avg) in &values {
        let y = map_y(avg, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(&mut grid, x0, y0, x, y, '-'),
            None => grid[y][x] = '-',
        }
        prev = Some((x, y));
    }

    let in_range: Vec<&PolicyRecord> = policies
        .iter()
        .copied()
        .filter(|p| p.date >= first.date && p.date <= last.date)
        .collect();
    let mut marker_row = vec![' '; width];
    for p in &in_range {
        let ch = match p.start_stop {
            StartStop::Start => '^',
            StartStop::Stop => 'v',
        };
        let cell = &mut marker_row[x_of(p.date)];
        *cell = if *cell == ' ' || *cell == ch { ch } else { '*' };
    }

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&format!(
        "{} per 100k: y=[{y_min:.2}, {y_max:.2}] | {} .. {}\n",
        measure.label(),
        first.date,
        last.date
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out.push_str(marker_row.into_iter().collect::<String>().trim_end());
    out.push('\n');
    for p in in_range {
        let ch = match p.start_stop {
            StartStop::Start => '^',
            StartStop::Stop => 'v',
        };
        out.push_str(&format!("  {ch} {}  {} ({})\n", p.date, p.policy_type, p.county));
    }
    out
}

fn y_range(values: &[(usize, f64, f64)]) -> (f64, f64) {
    let mut min_y = 0.0_f64;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, daily, avg) in values {
        for v in [daily, avg] {
            if v.is_finite() {
                min_y = min_y.min(v);
                max_y = max_y.max(v);
            }
        }
    }
    if max_y.is_finite() && max_y > min_y {
        (min_y, max_y)
    } else {
        (min_y, min_y + 1.0)
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = if y.is_finite() {
        ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    // Row 0 is the top.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Bresenham line; overwrites whatever is underneath.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x0, mut y0) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
        {
            *cell = ch;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PolicyLevel;

    fn rows(n: usize) -> Vec<CaseRecord> {
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        (0..n)
            .map(|i| CaseRecord {
                date: start + chrono::Duration::days(i as i64),
                state: "Ohio".into(),
                county: "adams".into(),
                full_loc_name: "adams, Ohio".into(),
                fips_code: 39001,
                total_population: 100_000,
                new_cases: i as i64,
                new_deaths: 0,
                new_cases_1e6: i as f64,
                new_deaths_1e6: 0.0,
                new_cases_7day: 1.0,
                new_deaths_7day: 0.0,
                new_cases_7day_1e6: 1.0,
                new_deaths_7day_1e6: 0.0,
            })
            .collect()
    }

    fn policy(day: u32, ss: StartStop) -> PolicyRecord {
        PolicyRecord {
            state: "Ohio".into(),
            county: "statewide".into(),
            fips_code: 39,
            policy_level: PolicyLevel::State,
            policy_type: "mask mandate".into(),
            start_stop: ss,
            date: NaiveDate::from_ymd_opt(2020, 4, day).unwrap(),
        }
    }

    #[test]
    fn plot_layout_and_markers() {
        let data = rows(10);
        let start = policy(6, StartStop::Start);
        let stop = policy(10, StartStop::Stop);
        let outside = policy(30, StartStop::Stop);
        let txt = render_case_plot("t", &data, &[&start, &stop, &outside], Measure::Cases, 10, 5);
        let lines: Vec<&str> = txt.lines().collect();

        // title, header, 5 grid rows, marker row, two in-range legend lines
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "t");
        assert!(lines[1].starts_with("cases per 100k:"));
        assert_eq!(lines[7], "     ^   v");
        assert!(lines[8].contains("2020-04-06"));
        // Largest daily value sits in the top-right corner.
        assert_eq!(lines[2].chars().last(), Some('.'));
    }

    #[test]
    fn empty_input_is_reported() {
        let txt = render_case_plot("t", &[], &[], Measure::Deaths, 10, 5);
        assert!(txt.contains("No data"));
    }
}

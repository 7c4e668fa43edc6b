use std::{borrow::Cow, fmt::Write as _};

pub const MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Renders `rows` under `headers`. Columns whose every non-empty cell is
/// numeric are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let cells = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(column_count)
                .map(|cell| fit_cell(cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut aligns = vec![Align::Right; column_count];
    for row in &cells {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell));
            if !cell.is_empty() && cell.parse::<f64>().is_err() {
                aligns[idx] = Align::Left;
            }
        }
    }
    if cells.is_empty() {
        aligns.fill(Align::Left);
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &aligns));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &aligns));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths, &aligns));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
    println!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" });
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let mut line = values
        .iter()
        .zip(widths.iter().zip(aligns))
        .map(|(value, (&width, &align))| {
            let padding = " ".repeat(width.saturating_sub(display_width(value)));
            match align {
                Align::Left => format!("{value}{padding}"),
                Align::Right => format!("{padding}{value}"),
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn fit_cell(value: &str) -> String {
    let sanitized = sanitize_cell(value);
    if display_width(&sanitized) <= MAX_CELL_WIDTH {
        return sanitized.into_owned();
    }
    let mut cut = sanitized
        .chars()
        .take(MAX_CELL_WIDTH - 1)
        .collect::<String>();
    cut.push('…');
    cut
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

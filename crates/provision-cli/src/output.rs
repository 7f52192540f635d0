use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Left-aligned columns separated by two spaces. The last column is never
/// padded, so long commands don't drag trailing whitespace along.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols.saturating_sub(1)) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == last {
                    c.to_string()
                } else {
                    format!("{:width$}", c, width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", render(headers.to_vec()));
    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));
    for row in rows {
        let cells: Vec<&str> = (0..cols)
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        println!("{}", render(cells));
    }
}

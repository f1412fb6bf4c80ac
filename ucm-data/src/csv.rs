//! Comma separated tables: one header line of column names, one line per row.

use crate::error::{DataError, Result};

/// Numeric cells use five decimals; missing values are written as `nan`.
pub fn format_cell(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{x:.5}")
    }
}

pub fn numeric_table<S: AsRef<str>>(columns: &[S], rows: &[Vec<f64>]) -> Vec<u8> {
    let mut out = header(columns);
    for row in rows {
        let cells: Vec<String> = row.iter().copied().map(format_cell).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

/// Text cells are written verbatim.
pub fn text_table<S: AsRef<str>>(columns: &[S], rows: &[Vec<String>]) -> Vec<u8> {
    let mut out = header(columns);
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

fn header<S: AsRef<str>>(columns: &[S]) -> String {
    let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    let mut out = names.join(",");
    out.push('\n');
    out
}

/// Reads a numeric table back, e.g. to verify a written file.
pub fn parse_numeric_table(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let text = std::str::from_utf8(bytes).map_err(|_| DataError::Encoding)?;
    let mut lines = text.lines();
    let columns: Vec<String> = lines
        .next()
        .filter(|h| !h.trim().is_empty())
        .ok_or(DataError::MissingHeader)?
        .split(',')
        .map(|c| c.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|cell| {
                cell.trim().parse::<f64>().map_err(|_| DataError::NotANumber {
                    line: i + 2,
                    cell: cell.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if row.len() != columns.len() {
            return Err(DataError::RaggedRow {
                line: i + 2,
                expected: columns.len(),
                found: row.len(),
            });
        }
        rows.push(row);
    }
    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_no_comment_prefix() {
        let bytes = numeric_table(&["df1", "df2"], &[vec![10.0, f64::NAN]]);
        assert_eq!(String::from_utf8(bytes).unwrap(), "df1,df2\n10.00000,nan\n");
    }

    #[test]
    fn text_cells_verbatim() {
        let bytes = text_table(
            &["id", "platform"],
            &[vec!["9534d327".to_string(), "linux".to_string()]],
        );
        assert_eq!(bytes, b"id,platform\n9534d327,linux\n");
    }

    #[test]
    fn round_trip_reproduces_rounded_values() {
        let rows = vec![
            vec![12.34567, 98.76543, 0.12345, 1.5, f64::NAN, f64::NAN],
            vec![0.0, 100.0, 0.33333, 2.99999, 0.5, 2.25],
        ];
        let columns = ["df1", "df2", "df1_grab", "df1_release", "df2_grab", "df2_release"];
        let bytes = numeric_table(&columns, &rows);
        let (cols, parsed) = parse_numeric_table(&bytes).unwrap();
        assert_eq!(cols, columns);
        for (a, b) in rows.iter().flatten().zip(parsed.iter().flatten()) {
            assert!(a == b || (a.is_nan() && b.is_nan()), "{a} != {b}");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_numeric_table(b""), Err(DataError::MissingHeader));
        assert!(matches!(
            parse_numeric_table(b"a,b\n1.0,x\n"),
            Err(DataError::NotANumber { line: 2, .. })
        ));
        assert!(matches!(
            parse_numeric_table(b"a,b\n1.0\n"),
            Err(DataError::RaggedRow { expected: 2, found: 1, .. })
        ));
    }
}

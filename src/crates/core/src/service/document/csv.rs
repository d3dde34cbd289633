//! Minimal CSV reading and writing for question sheets and exports.
//!
//! Quoted fields may contain separators, doubled quotes and line breaks.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of one column, padding short rows with empty strings.
    pub fn column(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect()
    }
}

fn split_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|v| v.trim().is_empty())
}

pub fn parse_csv(content: &str) -> CsvTable {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = split_records(content).into_iter();

    let headers = match records.next() {
        Some(h) if !is_blank(&h) => h.into_iter().map(|s| s.trim().to_string()).collect(),
        _ => return CsvTable::default(),
    };

    let rows = records.filter(|r| !is_blank(r)).collect();
    CsvTable { headers, rows }
}

pub fn escape_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub fn write_row<S: AsRef<str>>(out: &mut String, values: &[S]) {
    let line = values
        .iter()
        .map(|v| escape_field(v.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_commas_and_multiline_cells() {
        let content = "ID,Question\r\n1,\"Do you support SSO, SAML?\"\n2,\"Describe the \"\"audit\"\" log\nin detail\"\n\n3,Plain\n";
        let table = parse_csv(content);
        assert_eq!(table.headers, vec!["ID", "Question"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][1], "Do you support SSO, SAML?");
        assert_eq!(table.rows[1][1], "Describe the \"audit\" log\nin detail");
        assert_eq!(table.rows[2], vec!["3", "Plain"]);
    }

    #[test]
    fn handles_missing_trailing_newline_and_bom() {
        let table = parse_csv("\u{feff}Question\nWhat?");
        assert_eq!(table.headers, vec!["Question"]);
        assert_eq!(table.column(0), vec!["What?"]);
    }

    #[test]
    fn empty_input_has_no_headers() {
        assert_eq!(parse_csv(""), CsvTable::default());
        assert_eq!(parse_csv("\n\n"), CsvTable::default());
    }

    #[test]
    fn writes_escaped_rows() {
        let mut out = String::new();
        write_row(&mut out, &["1", "Yes, we do", "say \"hi\"", "a\nb"]);
        assert_eq!(out, "1,\"Yes, we do\",\"say \"\"hi\"\"\",\"a\nb\"\n");
        let table = parse_csv(&format!("a,b,c,d\n{}", out));
        assert_eq!(table.rows[0][3], "a\nb");
    }
}

// Minimal delimited-text reader: one header row, double-quote escaping,
// comma / semicolon / tab delimiters detected from the header.

const DELIMITERS: [char; 3] = [',', ';', '\t'];

pub(crate) struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse `text` as a table. `None` when it does not look delimited: fewer
/// than two lines, or a header without any delimiter.
pub(crate) fn parse_table(text: &str) -> Option<Table> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().find(|l| !l.trim().is_empty())?;
    let delimiter = detect_delimiter(header_line)?;

    let mut records = split_records(text, delimiter)
        .into_iter()
        .filter(|r| !(r.len() == 1 && r[0].trim().is_empty()));

    let headers: Vec<String> = records.next()?.into_iter().map(|h| h.trim().to_string()).collect();
    if headers.len() < 2 || headers.iter().all(|h| h.is_empty()) {
        return None;
    }
    let rows: Vec<Vec<String>> = records.collect();
    if rows.is_empty() {
        return None;
    }
    Some(Table { headers, rows })
}

fn detect_delimiter(header: &str) -> Option<char> {
    DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, header.matches(d).count()))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(d, _)| d)
}

/// Split into records of fields. Quoted fields may contain delimiters,
/// newlines, and `""` escapes.
fn split_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

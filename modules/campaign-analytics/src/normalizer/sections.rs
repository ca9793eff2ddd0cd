// `section:\nkey: value` text.
//
//   instagram:
//     likes: 10
//     impressions: 500
//
// A line ending in `:` (or a `#`/`[..]` heading) opens a section; `key: value`
// lines fill the current one. Entries before the first heading land in an
// unnamed section.

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Section {
    pub name: Option<String>,
    pub entries: Vec<(String, String)>,
}

/// Whether `text` reads as sectioned key/value text rather than a table.
pub(crate) fn looks_sectioned(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .is_some_and(|first| heading(first).is_some() || split_entry(first).is_some())
}

/// `None` when no `key: value` entry is found anywhere.
pub(crate) fn parse_sections(text: &str) -> Option<Vec<Section>> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section::default();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = heading(line) {
            if current.name.is_some() || !current.entries.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.name = Some(name.to_string());
        } else if let Some((key, value)) = split_entry(line) {
            current.entries.push((key.to_string(), value.to_string()));
        }
    }
    if current.name.is_some() || !current.entries.is_empty() {
        sections.push(current);
    }

    sections.retain(|s| !s.entries.is_empty());
    if sections.is_empty() {
        None
    } else {
        Some(sections)
    }
}

fn heading(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('#') {
        let name = rest.trim_start_matches('#').trim().trim_end_matches(':').trim();
        return (!name.is_empty()).then_some(name);
    }
    if let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
        let name = inner.trim();
        return (!name.is_empty()).then_some(name);
    }
    let name = line.strip_suffix(':')?.trim();
    (!name.is_empty() && !name.contains(':')).then_some(name)
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

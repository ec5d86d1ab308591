use siteswap_core::TreeEntry;

/// Parses FTP `LIST` output in either Unix (`drwxr-xr-x ...`) or DOS (`<DIR>`) style.
/// `.` and `..` are dropped; unrecognized lines are ignored.
pub fn parse_listing(raw: &str) -> Vec<TreeEntry> {
    raw.lines()
        .filter_map(parse_listing_line)
        .filter(|entry| entry.name != "." && entry.name != "..")
        .collect()
}

fn parse_listing_line(line: &str) -> Option<TreeEntry> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() || line.starts_with("total ") {
        return None;
    }

    let first = line.chars().next()?;
    if "dlbcps-".contains(first) {
        return parse_unix_line(line, first);
    }
    if first.is_ascii_digit() {
        return parse_dos_line(line);
    }
    None
}

fn parse_unix_line(line: &str, kind: char) -> Option<TreeEntry> {
    let (_, name) = split_leading_fields(line, 8)?;
    let name = match kind {
        'l' => name.split(" -> ").next().unwrap_or(name),
        _ => name,
    };
    if name.is_empty() {
        return None;
    }
    Some(TreeEntry {
        name: name.to_string(),
        is_directory: kind == 'd',
    })
}

fn parse_dos_line(line: &str) -> Option<TreeEntry> {
    let (fields, name) = split_leading_fields(line, 3)?;
    if name.is_empty() {
        return None;
    }
    Some(TreeEntry {
        name: name.to_string(),
        is_directory: fields[2].eq_ignore_ascii_case("<DIR>"),
    })
}

/// Splits off `count` whitespace-separated fields and returns them with the untouched
/// remainder, so names containing spaces survive.
fn split_leading_fields(line: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(count);
    let mut rest = line;
    for _ in 0..count {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    let name = rest.trim_start_matches([' ', '\t']);
    Some((fields, name))
}

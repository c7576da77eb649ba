use crate::matcher::AnnotatedCell;

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

/// Overlapping or touching spans become one highlighted region.
fn merged_regions(cell: &AnnotatedCell) -> Vec<(usize, usize)> {
    let mut regions: Vec<(usize, usize)> = Vec::new();
    for span in &cell.spans {
        match regions.last_mut() {
            Some(last) if span.start <= last.1 => last.1 = last.1.max(span.end),
            _ => regions.push((span.start, span.end)),
        }
    }
    regions
}

/// HTML for one result cell, keyword occurrences wrapped in `<mark>`.
pub fn cell_html(cell: &AnnotatedCell) -> String {
    let mut out = String::with_capacity(cell.text.len());
    let mut pos = 0;
    for (start, end) in merged_regions(cell) {
        escape_html(&cell.text[pos..start], &mut out);
        out.push_str("<mark>");
        escape_html(&cell.text[start..end], &mut out);
        out.push_str("</mark>");
        pos = end;
    }
    escape_html(&cell.text[pos..], &mut out);
    out
}

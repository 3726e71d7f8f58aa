use super::CompileError;

pub fn underline(line: &str, column: usize) -> String {
    let mut marker = String::new();
    for _ in 1..column {
        marker.push(' ');
    }
    marker.push('^');
    format!("{}\n{}", line, marker)
}

/// Render an error with the offending source line underneath it.
pub fn format_compile_error(label: &str, source: &str, err: &CompileError) -> String {
    let line_no = err.line();
    let mut out = format!("error: {}\n--> {}:{}", err, label, line_no);
    if let Some(column) = err.column() {
        out.push_str(&format!(":{}", column));
    }

    if let Some(text) = source.lines().nth(line_no.saturating_sub(1)) {
        out.push('\n');
        match err.column() {
            Some(column) => out.push_str(&underline(text, column)),
            None => out.push_str(text),
        }
    }
    out
}

//! Formula templates
//!
//! `{rowNumber}`, `{columnNumber}` and `{columnAlpha}` expand to the target
//! cell's coordinates. `\$` yields a literal `$`; other text is copied as is.

use crate::address::CellAddress;

pub fn expand(template: &str, address: CellAddress) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'$') => {
                chars.next();
                out.push('$');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(format!("unclosed placeholder in '{}'", template));
                }
                match name.trim() {
                    "rowNumber" => out.push_str(&address.row_number().to_string()),
                    "columnNumber" => out.push_str(&address.column_number().to_string()),
                    "columnAlpha" => out.push_str(&address.column_alpha()),
                    other => {
                        return Err(format!("unknown placeholder '{{{}}}' in '{}'", other, template))
                    }
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out.trim_start_matches('=').to_string())
}

//! Restricted YAML subset (§4.7): block sequences, block mappings, and
//! scalars with inferred types; no anchors, no comments, no flow
//! collections on parse (flow style is only ever produced, for empty
//! composites, on stringify).
//!
//! Grounded in `examples/original_source/src/ast/yaml/yaml_parse_simple/`
//! — the original likewise works line-by-line off indentation rather
//! than a full YAML grammar.

use xmd_core::Value;

use crate::error::RuntimeError;

pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, 0, &mut out, true);
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn write_value(value: &Value, indent: usize, out: &mut String, top_level: bool) {
    match value {
        Value::Array(items) => {
            let items = items.borrow();
            if items.is_empty() {
                out.push_str("[]\n");
                return;
            }
            for item in items.iter() {
                push_indent(indent, out);
                out.push_str("- ");
                match item {
                    Value::Array(_) | Value::Object(_) => {
                        out.push('\n');
                        write_value(item, indent + 1, out, false);
                    }
                    scalar => out.push_str(&scalar_string(scalar)),
                }
                if !matches!(item, Value::Array(_) | Value::Object(_)) {
                    out.push('\n');
                }
            }
        }
        Value::Object(pairs) => {
            let pairs = pairs.borrow();
            if pairs.is_empty() {
                out.push_str("{}\n");
                return;
            }
            for (key, val) in pairs.iter() {
                push_indent(indent, out);
                out.push_str(key);
                out.push(':');
                match val {
                    Value::Array(_) | Value::Object(_) => {
                        out.push('\n');
                        write_value(val, indent + 1, out, false);
                    }
                    scalar => {
                        out.push(' ');
                        out.push_str(&scalar_string(scalar));
                        out.push('\n');
                    }
                }
            }
        }
        scalar => {
            if top_level {
                out.push_str(&scalar_string(scalar));
                out.push('\n');
            }
        }
    }
}

fn push_indent(indent: usize, out: &mut String) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Number(n) => value_number_string(*n),
        Value::String(s) => {
            if needs_quoting(s) {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                s.clone()
            }
        }
        _ => unreachable!("scalar_string called on composite"),
    }
}

fn value_number_string(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || matches!(s, "true" | "false" | "null" | "~")
        || s.parse::<f64>().is_ok()
        || s.starts_with(['-', '[', '{', '"', '\'', '#', '&', '*'])
        || s.contains(": ")
        || s.trim() != s
}

pub fn parse(text: &str) -> Result<Value, RuntimeError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| (indent_of(l), l.trim()))
        .collect();
    if lines.is_empty() {
        return Ok(Value::Null);
    }
    let base_indent = lines[0].0;
    let (value, consumed) = parse_block(&lines, 0, base_indent)?;
    let _ = consumed;
    Ok(value)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parse a block of lines at exactly `indent`, starting at `lines[start]`.
/// Returns the parsed value and the index just past the consumed lines.
fn parse_block(
    lines: &[(usize, &str)],
    start: usize,
    indent: usize,
) -> Result<(Value, usize), RuntimeError> {
    if start >= lines.len() || lines[start].0 != indent {
        return Err(RuntimeError::YamlParse {
            message: "unexpected indentation".to_string(),
            line: start,
        });
    }

    if lines[start].1.starts_with("- ") || lines[start].1 == "-" {
        parse_sequence(lines, start, indent)
    } else {
        parse_mapping(lines, start, indent)
    }
}

fn parse_sequence(
    lines: &[(usize, &str)],
    start: usize,
    indent: usize,
) -> Result<(Value, usize), RuntimeError> {
    let mut items = Vec::new();
    let mut i = start;
    while i < lines.len() && lines[i].0 == indent && (lines[i].1.starts_with("- ") || lines[i].1 == "-") {
        let rest = lines[i].1.strip_prefix('-').unwrap_or("").trim_start();
        if rest.is_empty() {
            if i + 1 < lines.len() && lines[i + 1].0 > indent {
                let (value, next) = parse_block(lines, i + 1, lines[i + 1].0)?;
                items.push(value);
                i = next;
            } else {
                items.push(Value::Null);
                i += 1;
            }
        } else {
            items.push(parse_scalar(rest));
            i += 1;
        }
    }
    Ok((Value::array(items), i))
}

fn parse_mapping(
    lines: &[(usize, &str)],
    start: usize,
    indent: usize,
) -> Result<(Value, usize), RuntimeError> {
    let mut pairs = Vec::new();
    let mut i = start;
    while i < lines.len() && lines[i].0 == indent {
        let line = lines[i].1;
        let colon = line.find(':').ok_or_else(|| RuntimeError::YamlParse {
            message: format!("expected 'key: value' in '{}'", line),
            line: i,
        })?;
        let key = line[..colon].trim().to_string();
        let rest = line[colon + 1..].trim();
        if rest.is_empty() {
            if i + 1 < lines.len() && lines[i + 1].0 > indent {
                let (value, next) = parse_block(lines, i + 1, lines[i + 1].0)?;
                pairs.push((key, value));
                i = next;
            } else {
                pairs.push((key, Value::Null));
                i += 1;
            }
        } else {
            pairs.push((key, parse_scalar(rest)));
            i += 1;
        }
    }
    Ok((Value::object(pairs), i))
}

fn parse_scalar(text: &str) -> Value {
    let text = text.trim();
    if text == "[]" {
        return Value::empty_array();
    }
    if text == "{}" {
        return Value::empty_object();
    }
    if (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
        || (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
    {
        return Value::String(text[1..text.len() - 1].to_string());
    }
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = text.parse::<f64>() {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_mapping_with_scalar_types() {
        let yaml = "name: xmd\ncount: 3\nenabled: true\nmissing: null\n";
        let value = parse(yaml).unwrap();
        assert_eq!(value.object_get("name"), Value::String("xmd".to_string()));
        assert_eq!(value.object_get("count"), Value::Number(3.0));
        assert_eq!(value.object_get("enabled"), Value::Bool(true));
        assert_eq!(value.object_get("missing"), Value::Null);
    }

    #[test]
    fn parses_block_sequence() {
        let yaml = "- 1\n- 2\n- 3\n";
        let value = parse(yaml).unwrap();
        assert_eq!(value.array_len(), Some(3));
        assert_eq!(value.array_get(1), Value::Number(2.0));
    }

    #[test]
    fn parses_nested_mapping_of_sequences() {
        let yaml = "fruits:\n  - apple\n  - pear\ncount: 2\n";
        let value = parse(yaml).unwrap();
        let fruits = value.object_get("fruits");
        assert_eq!(fruits.array_len(), Some(2));
        assert_eq!(fruits.array_get(0), Value::String("apple".to_string()));
    }

    #[test]
    fn stringify_round_trips_through_parse() {
        let value = Value::object(vec![
            ("a".to_string(), Value::Number(1.0)),
            ("b".to_string(), Value::Bool(false)),
        ]);
        let text = stringify(&value);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn empty_composites_stringify_flow_style() {
        assert_eq!(stringify(&Value::empty_array()), "[]");
        assert_eq!(stringify(&Value::empty_object()), "{}");
    }
}

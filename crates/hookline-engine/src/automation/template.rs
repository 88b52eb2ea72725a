//! `{{field}}` placeholder rendering for webhook action configs.
//!
//! A placeholder is `{{`, a key with optional surrounding whitespace, then
//! `}}`. The key is looked up exactly in the top level of `trigger_data`.
//! Strings are inserted verbatim, numbers and booleans as their JSON text,
//! arrays and objects as compact JSON. `null` and missing keys render as
//! the empty string. An unclosed `{{` is left untouched.

use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Render every placeholder in `template` against `data`.
pub fn render_str(template: &str, data: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let key = after_open[..end].trim();
        out.push_str(&lookup(data, key));
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Render placeholders in every string leaf of `template`. Keys and
/// non-string leaves are kept as-is.
pub fn render_value(template: &Value, data: &Value) -> Value {
    match template {
        Value::String(s) => Value::String(render_str(s, data)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn lookup(data: &Value, key: &str) -> String {
    match data.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Value {
        json!({
            "name": "Jane",
            "amount": 12.5,
            "count": 3,
            "paid": false,
            "notes": null,
            "tags": ["a", "b"],
            "addr": {"city": "Oslo"}
        })
    }

    #[test]
    fn substitutes_scalars() {
        assert_eq!(
            render_str("Hi {{name}}, {{count}} items, {{amount}} due, paid={{paid}}", &data()),
            "Hi Jane, 3 items, 12.5 due, paid=false"
        );
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        assert_eq!(render_str("{{ name }}", &data()), "Jane");
    }

    #[test]
    fn missing_and_null_render_empty() {
        assert_eq!(render_str("[{{nope}}][{{notes}}]", &data()), "[][]");
    }

    #[test]
    fn compound_values_render_as_json() {
        assert_eq!(render_str("{{tags}}", &data()), r#"["a","b"]"#);
        assert_eq!(render_str("{{addr}}", &data()), r#"{"city":"Oslo"}"#);
    }

    #[test]
    fn unclosed_placeholder_is_left_alone() {
        assert_eq!(render_str("{{name}} and {{name", &data()), "Jane and {{name");
        assert_eq!(render_str("no placeholders", &data()), "no placeholders");
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(render_str("{{Name}}", &data()), "");
    }

    #[test]
    fn renders_nested_body_leaves() {
        let body = json!({
            "text": "New lead {{name}}",
            "meta": {"ids": ["{{count}}", 7]},
            "flag": true
        });
        assert_eq!(
            render_value(&body, &data()),
            json!({
                "text": "New lead Jane",
                "meta": {"ids": ["3", 7]},
                "flag": true
            })
        );
    }
}

//! Resource query parsing.
//!
//! A resource reference may carry per-resource options after a `?`. Two
//! syntaxes are accepted:
//!
//! ```text
//! ?sizes[]=320&sizes[]=640&quality=70&+placeholder&-emit_file
//! ?{sizes:[320,640],quality:70,placeholder:true}
//! ```
//!
//! In the first form `,` separates arguments just like `&`, values are
//! percent-decoded, `true`/`false` become booleans and `null` is ignored.
//! A bare name sets the flag to `true`; `+name` and `-name` set it
//! explicitly. A trailing `[]` appends to a list. The second form is JSON5:
//! keys may be unquoted and strings single-quoted.
//!
//! Keys may be given in camelCase (`placeholderSize`) or snake_case; they
//! are normalized to snake_case. Nested keys under `cache` use dotted
//! names: `cache.enabled=true`.
//!
//! The parser produces a `toml::Table` that merges onto the file and
//! default layers (see [`crate::config::merge_toml`]). Values stay text;
//! the config deserializer accepts numeric strings.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use toml::{Table, Value};

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("query must start with '?', got {0:?}")]
    MissingPrefix(String),
    #[error("invalid JSON5 query: {0}")]
    Json(String),
    #[error("JSON query must be an object")]
    NotAnObject,
    #[error("invalid percent-encoding in {0:?}")]
    Decode(String),
    #[error("{key:?} is not a table")]
    NotATable { key: String },
}

/// Parse a resource query string into an options table.
///
/// An empty query or a lone `?` yields an empty table.
pub fn parse_query(query: &str) -> Result<Table, QueryError> {
    let Some(body) = query.strip_prefix('?') else {
        return Err(QueryError::MissingPrefix(query.to_string()));
    };
    let body = body.trim();
    if body.is_empty() {
        return Ok(Table::new());
    }
    if body.starts_with('{') {
        return parse_json(body);
    }

    let mut table = Table::new();
    for arg in body.split(['&', ',']).filter(|a| !a.is_empty()) {
        match arg.split_once('=') {
            Some((raw_name, raw_value)) => {
                let name = decode(raw_name)?;
                let value = decode(raw_value)?;
                let value = match value.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => continue,
                    _ => Value::String(value),
                };
                match name.strip_suffix("[]") {
                    Some(list) => append(&mut table, list, value)?,
                    None => insert(&mut table, &name, value)?,
                }
            }
            None => {
                let name = decode(arg)?;
                let (flag, value) = if let Some(rest) = name.strip_prefix('-') {
                    (rest, false)
                } else if let Some(rest) = name.strip_prefix('+') {
                    (rest, true)
                } else {
                    (name.as_str(), true)
                };
                insert(&mut table, flag, Value::Boolean(value))?;
            }
        }
    }
    Ok(table)
}

fn parse_json(body: &str) -> Result<Table, QueryError> {
    let json: serde_json::Value =
        json5::from_str(body).map_err(|e| QueryError::Json(e.to_string()))?;
    match json_to_toml(json) {
        Some(Value::Table(table)) => Ok(table),
        _ => Err(QueryError::NotAnObject),
    }
}

/// Convert JSON to TOML, normalizing object keys. `null` has no TOML
/// counterpart and is dropped. Whole floats become integers, since JSON5
/// numbers may arrive as doubles.
fn json_to_toml(json: serde_json::Value) -> Option<Value> {
    Some(match json {
        serde_json::Value::Null => return None,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Integer(i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < (1u64 << 53) as f64 => {
                Value::Integer(f as i64)
            }
            (None, f) => Value::Float(f?),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().filter_map(json_to_toml).collect())
        }
        serde_json::Value::Object(map) => Value::Table(
            map.into_iter()
                .filter_map(|(k, v)| Some((snake_case(&k), json_to_toml(v)?)))
                .collect(),
        ),
    })
}

fn decode(raw: &str) -> Result<String, QueryError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| QueryError::Decode(raw.to_string()))
}

/// Walk `cache.enabled`-style dotted names down to the owning table.
fn target<'a>(table: &'a mut Table, name: &str) -> Result<(&'a mut Table, String), QueryError> {
    let mut parts: Vec<String> = name.split('.').map(snake_case).collect();
    let leaf = parts.pop().unwrap_or_default();
    let mut current = table;
    for part in parts {
        let entry = current
            .entry(part.clone())
            .or_insert(Value::Table(Table::new()));
        current = match entry {
            Value::Table(t) => t,
            _ => return Err(QueryError::NotATable { key: part }),
        };
    }
    Ok((current, leaf))
}

fn insert(table: &mut Table, name: &str, value: Value) -> Result<(), QueryError> {
    let (owner, key) = target(table, name)?;
    owner.insert(key, value);
    Ok(())
}

fn append(table: &mut Table, name: &str, value: Value) -> Result<(), QueryError> {
    let (owner, key) = target(table, name)?;
    match owner.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        _ => {
            owner.insert(key, Value::Array(vec![value]));
        }
    }
    Ok(())
}

/// `placeholderSize` → `placeholder_size`. Already snake_case names pass
/// through unchanged.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn empty_query_is_empty_table() {
        assert!(parse_query("?").unwrap().is_empty());
        assert!(parse_query("? ").unwrap().is_empty());
    }

    #[test]
    fn missing_prefix_is_error() {
        assert!(matches!(
            parse_query("sizes[]=100"),
            Err(QueryError::MissingPrefix(_))
        ));
    }

    #[test]
    fn key_value_pairs() {
        let t = parse_query("?quality=70&name=img-[width].[ext]").unwrap();
        assert_eq!(t["quality"], s("70"));
        assert_eq!(t["name"], s("img-[width].[ext]"));
    }

    #[test]
    fn list_syntax_appends_in_order() {
        let t = parse_query("?sizes[]=500&sizes[]=2000").unwrap();
        assert_eq!(t["sizes"], Value::Array(vec![s("500"), s("2000")]));
    }

    #[test]
    fn comma_separates_like_ampersand() {
        let t = parse_query("?sizes[]=100,sizes[]=200,placeholder").unwrap();
        assert_eq!(t["sizes"], Value::Array(vec![s("100"), s("200")]));
        assert_eq!(t["placeholder"], Value::Boolean(true));
    }

    #[test]
    fn flags() {
        let t = parse_query("?placeholder&-emitFile&+esModule").unwrap();
        assert_eq!(t["placeholder"], Value::Boolean(true));
        assert_eq!(t["emit_file"], Value::Boolean(false));
        assert_eq!(t["es_module"], Value::Boolean(true));
    }

    #[test]
    fn special_values() {
        let t = parse_query("?disable=true&progressive=false&format=null").unwrap();
        assert_eq!(t["disable"], Value::Boolean(true));
        assert_eq!(t["progressive"], Value::Boolean(false));
        assert!(!t.contains_key("format"));
    }

    #[test]
    fn values_are_percent_decoded() {
        let t = parse_query("?background=%23ff0000&public_path=https%3A%2F%2Fcdn.test%2F").unwrap();
        assert_eq!(t["background"], s("#ff0000"));
        assert_eq!(t["public_path"], s("https://cdn.test/"));
    }

    #[test]
    fn camel_case_keys_normalized() {
        let t = parse_query("?placeholderSize=20&outputPath=img").unwrap();
        assert_eq!(t["placeholder_size"], s("20"));
        assert_eq!(t["output_path"], s("img"));
    }

    #[test]
    fn dotted_keys_nest() {
        let t = parse_query("?cache.enabled=true&cache.directory=tmp").unwrap();
        let cache = t["cache"].as_table().unwrap();
        assert_eq!(cache["enabled"], Value::Boolean(true));
        assert_eq!(cache["directory"], s("tmp"));
    }

    #[test]
    fn dotted_key_under_scalar_is_error() {
        assert!(matches!(
            parse_query("?cache=1&cache.enabled=true"),
            Err(QueryError::NotATable { .. })
        ));
    }

    #[test]
    fn json_form() {
        let t = parse_query(r#"?{"sizes":[500,2000],"placeholderSize":20,"format":null}"#)
            .unwrap();
        assert_eq!(
            t["sizes"],
            Value::Array(vec![Value::Integer(500), Value::Integer(2000)])
        );
        assert_eq!(t["placeholder_size"], Value::Integer(20));
        assert!(!t.contains_key("format"));
    }

    #[test]
    fn json5_unquoted_keys_and_single_quotes() {
        let t = parse_query("?{sizes:[100,200],placeholder:true,name:'[width].[ext]',}").unwrap();
        assert_eq!(
            t["sizes"],
            Value::Array(vec![Value::Integer(100), Value::Integer(200)])
        );
        assert_eq!(t["placeholder"], Value::Boolean(true));
        assert_eq!(t["name"], s("[width].[ext]"));
    }

    #[test]
    fn json_form_nested_table() {
        let t = parse_query(r#"?{"cache":{"enabled":true}}"#).unwrap();
        assert_eq!(t["cache"]["enabled"], Value::Boolean(true));
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(matches!(parse_query("?{sizes:"), Err(QueryError::Json(_))));
        assert!(matches!(parse_query("?{oops}"), Err(QueryError::Json(_))));
    }

    #[test]
    fn invalid_utf8_escape_is_error() {
        assert!(matches!(
            parse_query("?name=%FF"),
            Err(QueryError::Decode(_))
        ));
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(snake_case("esModule"), "es_module");
        assert_eq!(snake_case("runtimePublicPath"), "runtime_public_path");
        assert_eq!(snake_case("quality"), "quality");
        assert_eq!(snake_case("emit_file"), "emit_file");
    }
}

//! JSON-pointer walking over the merged config.

use serde_json::Value;

/// Every scalar leaf as `(pointer, value)`, depth first, object keys in map
/// order. Array elements are addressed by index. A scalar root is `"/"`.
pub(crate) fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk(root, String::new(), &mut out);
    out
}

fn walk<'a>(node: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, format!("{at}/{}", escape(key)), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, format!("{at}/{i}"), out);
            }
        }
        scalar => {
            let at = if at.is_empty() { "/".to_string() } else { at };
            out.push((at, scalar));
        }
    }
}

/// RFC 6901 token escaping.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// `"/a/b"` covers `"/a/b"` and `"/a/b/c"` but not `"/a/bc"`. `"/"` covers all.
pub(crate) fn covers(prefix: &str, pointer: &str) -> bool {
    prefix == "/"
        || pointer == prefix
        || pointer
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

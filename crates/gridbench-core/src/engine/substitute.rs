//! Variable substitution over structured configs.
//!
//! Walks the document and rewrites every `${name}` occurrence in string
//! leaves from the binding map. Single pass: replacement text is never
//! re-scanned. Unmatched tokens stay intact so downstream tools can carry
//! their own placeholders.

use serde_json::Value;
use std::collections::BTreeMap;

pub type Bindings = BTreeMap<String, String>;

pub fn substitute(value: &Value, bindings: &Bindings) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, bindings)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute(v, bindings)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, bindings)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(input: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match bindings.get(name) {
                    Some(replacement) => out.push_str(replacement),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // unterminated token, keep verbatim
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_bindings_leave_every_leaf_identical() {
        let cfg = json!({
            "output": {"filename": "dataset_seed_${iteration}.arff"},
            "count": 3,
            "tags": ["${attackName}", "literal"]
        });
        assert_eq!(substitute(&cfg, &Bindings::new()), cfg);
    }

    #[test]
    fn bound_tokens_are_replaced_everywhere() {
        let cfg = json!({
            "output": {"filename": "dataset_seed_${iteration}.arff"},
            "note": "run ${iteration} of ${iteration}"
        });
        let out = substitute(&cfg, &bindings(&[("iteration", "2")]));
        assert_eq!(out["output"]["filename"], json!("dataset_seed_2.arff"));
        assert_eq!(out["note"], json!("run 2 of 2"));
    }

    #[test]
    fn unmatched_tokens_and_non_strings_are_untouched() {
        let cfg = json!({"a": "${unknown} and ${attack1}", "n": 7, "b": true});
        let out = substitute(&cfg, &bindings(&[("attack1", "uc01")]));
        assert_eq!(out["a"], json!("${unknown} and uc01"));
        assert_eq!(out["n"], json!(7));
        assert_eq!(out["b"], json!(true));
    }

    #[test]
    fn substitution_is_single_pass() {
        // the replacement contains a token that is itself bound; a second
        // scan would rewrite it
        let out = substitute(
            &json!("${a}"),
            &bindings(&[("a", "${b}"), ("b", "nope")]),
        );
        assert_eq!(out, json!("${b}"));
    }

    #[test]
    fn unterminated_token_is_kept_verbatim() {
        let out = substitute(&json!("prefix ${open"), &bindings(&[("open", "x")]));
        assert_eq!(out, json!("prefix ${open"));
    }
}

//! Clearing of field values before data leaves an instance.

use serde_json::Value;

use crate::model::is_truthy;

/// Copy `records` and null out every listed field that holds a truthy value.
///
/// Falsy values (`null`, `false`, `0`, `""`) and absent keys are left as they
/// are; keys are never removed. The input is not modified.
pub fn redact<S: AsRef<str>>(records: &[Value], field_names: &[S]) -> Vec<Value> {
    let mut copy = records.to_vec();
    for record in copy.iter_mut() {
        let Some(object) = record.as_object_mut() else {
            continue;
        };
        for name in field_names {
            if let Some(value) = object.get_mut(name.as_ref()) {
                if is_truthy(value) {
                    *value = Value::Null;
                }
            }
        }
    }
    copy
}

/// Redact an export payload that is either an array of records or a single record.
pub fn redact_value<S: AsRef<str>>(payload: &Value, field_names: &[S]) -> Value {
    match payload {
        Value::Array(records) => Value::Array(redact(records, field_names)),
        Value::Object(_) => redact(std::slice::from_ref(payload), field_names)
            .pop()
            .unwrap_or(Value::Null),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clears_truthy_values_only() {
        let records = vec![
            json!({"id": 1, "foo": "x", "bar": 2}),
            json!({"id": 2, "foo": 0}),
            json!({"id": 3, "foo": ""}),
            json!({"id": 4, "foo": false}),
            json!({"id": 5, "foo": null}),
            json!({"id": 6}),
            json!({"id": 7, "foo": {"nested": true}}),
        ];

        let redacted = redact(&records, &["foo"]);

        assert_eq!(redacted[0], json!({"id": 1, "foo": null, "bar": 2}));
        assert_eq!(redacted[1], json!({"id": 2, "foo": 0}));
        assert_eq!(redacted[2], json!({"id": 3, "foo": ""}));
        assert_eq!(redacted[3], json!({"id": 4, "foo": false}));
        assert_eq!(redacted[4], json!({"id": 5, "foo": null}));
        assert_eq!(redacted[5], json!({"id": 6}));
        assert_eq!(redacted[6], json!({"id": 7, "foo": null}));
    }

    #[test]
    fn input_is_not_mutated() {
        let records = vec![json!({"foo": "keep me"})];
        let redacted = redact(&records, &["foo".to_string()]);
        assert_eq!(records[0]["foo"], "keep me");
        assert_eq!(redacted[0]["foo"], Value::Null);
        assert!(!std::ptr::eq(&records[0], &redacted[0]));
    }

    #[test]
    fn non_object_records_pass_through() {
        let records = vec![json!(42), json!("text")];
        assert_eq!(redact(&records, &["foo"]), records);
    }

    #[test]
    fn redacts_single_object_payload() {
        let payload = json!({"owner": "u-1", "title": "t"});
        assert_eq!(
            redact_value(&payload, &["owner"]),
            json!({"owner": null, "title": "t"})
        );
        assert_eq!(redact_value(&json!("raw"), &["owner"]), json!("raw"));
    }
}

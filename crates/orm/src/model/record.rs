//! Conversions between entities, records and result rows

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

use super::{EntityDescriptor, Record};

/// Serialize an entity into its record form
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> OrmResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        other => Err(OrmError::Serialization(format!(
            "entities must serialize to an object, got {}",
            other
        ))),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> OrmResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Unset attributes carry no filter and mark a key as not yet generated
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0" || s.eq_ignore_ascii_case("NULL"),
        _ => false,
    }
}

/// Build a full record from a result row.
///
/// Starts from the default instance and overwrites every attribute the row
/// answers for, coercing database scalars to the JSON shape the default
/// instance uses. Only columns declared as timestamps get their text
/// normalized. Unknown row labels are ignored.
pub fn materialize(descriptor: &EntityDescriptor, row: Record) -> Record {
    let mut record = descriptor.new_record();

    for (label, value) in row {
        let column = match descriptor.columns.iter().find(|column| column.answers_to(&label)) {
            Some(column) => column,
            None => continue,
        };
        let value = match value {
            Value::String(s) if column.timestamp => Value::String(normalize_timestamp(s)),
            other => other,
        };
        let coerced = coerce(descriptor.template().get(&column.attribute), value);
        record.insert(column.attribute.clone(), coerced);
    }

    record
}

fn coerce(template: Option<&Value>, value: Value) -> Value {
    match (template, value) {
        (_, Value::Null) => Value::Null,
        (Some(Value::Bool(_)), Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        (Some(Value::Bool(_)), Value::String(s)) => {
            Value::Bool(matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "t" | "y"))
        }
        (Some(Value::Number(_)), Value::String(s)) => parse_number(&s).unwrap_or(Value::String(s)),
        (Some(Value::Number(_)), Value::Bool(b)) => Value::from(u8::from(b)),
        (Some(Value::String(_)), Value::Number(n)) => Value::String(n.to_string()),
        (_, other) => other,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Databases hand timestamps back as `YYYY-MM-DD HH:MM:SS`; serde expects
/// the ISO `T` separator
fn normalize_timestamp(text: String) -> String {
    let candidate = text.get(..19).unwrap_or(&text);
    if candidate.len() == 19
        && candidate.as_bytes()[10] == b' '
        && NaiveDateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S").is_ok()
    {
        let mut normalized = text;
        normalized.replace_range(10..11, "T");
        normalized
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSchema, EntitySchema};
    use serde_json::json;

    #[test]
    fn test_unset_values() {
        assert!(is_unset(&json!(null)));
        assert!(is_unset(&json!(0)));
        assert!(is_unset(&json!(0.0)));
        assert!(is_unset(&json!("")));
        assert!(is_unset(&json!("0")));
        assert!(is_unset(&json!("NULL")));
        assert!(!is_unset(&json!(false)));
        assert!(!is_unset(&json!(12)));
        assert!(!is_unset(&json!("roberto")));
    }

    #[test]
    fn test_coerce_follows_template_shape() {
        assert_eq!(coerce(Some(&json!(false)), json!(1)), json!(true));
        assert_eq!(coerce(Some(&json!(false)), json!("0")), json!(false));
        assert_eq!(coerce(Some(&json!(0)), json!("42")), json!(42));
        assert_eq!(coerce(Some(&json!(0)), json!("4.5")), json!(4.5));
        assert_eq!(coerce(Some(&json!("")), json!(7)), json!("7"));
        assert_eq!(coerce(Some(&json!(null)), json!(null)), json!(null));
    }

    #[test]
    fn test_timestamps_are_normalized() {
        assert_eq!(normalize_timestamp("2024-03-01 10:20:30".into()), "2024-03-01T10:20:30");
        assert_eq!(
            normalize_timestamp("2024-03-01 10:20:30.125".into()),
            "2024-03-01T10:20:30.125"
        );
        assert_eq!(normalize_timestamp("roberto".into()), "roberto");
        assert_eq!(normalize_timestamp("2024-03-01".into()), "2024-03-01");
    }

    #[test]
    fn test_only_timestamp_columns_are_normalized() {
        let descriptor = EntityDescriptor::from_schema(
            EntitySchema::new()
                .table("note")
                .column(ColumnSchema::key("id"))
                .column(ColumnSchema::new("body"))
                .column(ColumnSchema::new("written_at").timestamp()),
            std::any::TypeId::of::<()>(),
            "note",
            Record::new(),
        );
        let record = materialize(
            &descriptor.unwrap(),
            json!({"id": 1, "body": "2024-03-01 10:20:30", "written_at": "2024-03-01 10:20:30"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(record["body"], json!("2024-03-01 10:20:30"));
        assert_eq!(record["written_at"], json!("2024-03-01T10:20:30"));
    }

    #[test]
    fn test_to_record_rejects_scalars() {
        assert!(to_record(&json!({"id": 1})).is_ok());
        assert!(matches!(to_record(&5), Err(OrmError::Serialization(_))));
    }
}

//! Record-level statement execution shared by repositories and the relation
//! resolver

use serde_json::Value;

use crate::backends::Session;
use crate::error::{OrmError, OrmResult};
use crate::model::record::materialize;
use crate::model::{EntityDescriptor, Record};
use crate::query::{synthesize, Action, QueryOptions};

/// Run a `Get` or `List` and materialize every row
pub async fn fetch(
    session: &mut Session,
    descriptor: &EntityDescriptor,
    action: Action,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<Vec<Record>> {
    let sql = synthesize(descriptor, action, filter, None, options)?;
    let rows = session.query(&sql).await?;
    Ok(rows.into_iter().map(|row| materialize(descriptor, row)).collect())
}

/// First row matching `filter` with equality predicates
pub async fn fetch_one(
    session: &mut Session,
    descriptor: &EntityDescriptor,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<Option<Record>> {
    let rows = fetch(session, descriptor, Action::Get, filter, options).await?;
    Ok(rows.into_iter().next())
}

/// Run a `Count` or `Max` and read the single value it returns
pub async fn scalar(
    session: &mut Session,
    descriptor: &EntityDescriptor,
    action: Action,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<i64> {
    let sql = synthesize(descriptor, action, filter, None, options)?;
    let rows = session.query(&sql).await?;

    let value = rows
        .first()
        .and_then(|row| {
            row.get(&descriptor.key().attribute)
                .or_else(|| row.values().next())
        })
        .cloned()
        .unwrap_or(Value::Null);

    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| OrmError::Execution(format!("{} result out of range", action))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| OrmError::Execution(format!("{} returned non-numeric value '{}'", action, s))),
        other => Err(OrmError::Execution(format!("{} returned unexpected value {}", action, other))),
    }
}

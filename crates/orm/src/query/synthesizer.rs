//! SQL statement synthesis from entity descriptors
//!
//! Statements are plain SQL text with inline literals. Each clause is built
//! into its own string and joined with single spaces, so the output never
//! carries doubled or trailing whitespace.

use serde_json::Value;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::model::record::is_unset;
use crate::model::{ColumnDescriptor, EntityDescriptor, Record};

use super::literal;
use super::types::{Action, QueryOptions};

const AND: &str = "AND";
const OR: &str = "OR";
const EMPTY_PREDICATE: &str = "1 = 1";

/// Create when the key is still unset, Edit otherwise
pub fn persistence_action(descriptor: &EntityDescriptor, record: &Record) -> Action {
    match descriptor.key_value(record) {
        Some(_) => Action::Edit,
        None => Action::Create,
    }
}

/// Whether `filter` yields at least one predicate term for a write.
///
/// Edits and deletes refuse to run without one, since the predicate would
/// otherwise match every row.
pub fn restricts(descriptor: &EntityDescriptor, action: Action, filter: &Record) -> bool {
    descriptor
        .columns
        .iter()
        .filter(|column| column.aggregate.is_none() && column.join.is_none())
        .filter_map(|column| filter.get(&column.attribute))
        .any(|value| match value {
            Value::Bool(false) => action == Action::Edit,
            Value::Array(_) | Value::Object(_) => false,
            value => !is_unset(value),
        })
}

/// Build the statement for `action`.
///
/// `entity` supplies values for Create and Edit. The predicate comes from
/// `filter`, falling back to `entity` itself for reads and deletes and to the
/// entity's key for edits.
pub fn synthesize(
    descriptor: &EntityDescriptor,
    action: Action,
    entity: &Record,
    filter: Option<&Record>,
    options: &QueryOptions,
) -> OrmResult<String> {
    let sql = match action {
        Action::Create => insert_statement(descriptor, entity)?,
        Action::Edit => {
            let key_filter;
            let filter = match filter {
                Some(filter) => filter,
                None => {
                    key_filter = descriptor.key_filter(entity);
                    &key_filter
                }
            };
            update_statement(descriptor, entity, filter, options)?
        }
        Action::Delete => {
            let predicate = predicate(descriptor, action, filter.unwrap_or(entity), options)?;
            format!("DELETE FROM {} WHERE {}", descriptor.table, predicate)
        }
        Action::Count | Action::Max => {
            aggregate_key_statement(descriptor, action, filter.unwrap_or(entity), options)?
        }
        Action::Get | Action::List => select_statement(descriptor, action, filter.unwrap_or(entity), options)?,
    };

    debug!(entity = descriptor.type_name, %action, sql = %sql, "Synthesized statement");
    Ok(sql)
}

fn insert_statement(descriptor: &EntityDescriptor, entity: &Record) -> OrmResult<String> {
    let mut columns = Vec::new();
    let mut values = Vec::new();

    for column in descriptor.persisted_columns().filter(|column| !column.primary_key) {
        columns.push(column.column.as_str());
        values.push(literal::render(&column.attribute, attribute_value(entity, column))?);
    }

    if columns.is_empty() {
        return Err(OrmError::StatementSynthesis(format!(
            "{} has no columns to insert",
            descriptor.type_name
        )));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        descriptor.table,
        columns.join(", "),
        values.join(", ")
    ))
}

fn update_statement(
    descriptor: &EntityDescriptor,
    entity: &Record,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<String> {
    let mut assignments = Vec::new();
    for column in descriptor.persisted_columns().filter(|column| !column.primary_key) {
        let value = literal::render(&column.attribute, attribute_value(entity, column))?;
        assignments.push(format!("{} = {}", column.column, value));
    }

    if assignments.is_empty() {
        return Err(OrmError::StatementSynthesis(format!(
            "{} has no columns to update",
            descriptor.type_name
        )));
    }

    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        descriptor.table,
        assignments.join(", "),
        predicate(descriptor, Action::Edit, filter, options)?
    ))
}

fn aggregate_key_statement(
    descriptor: &EntityDescriptor,
    action: Action,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<String> {
    let function = if action == Action::Max { "MAX" } else { "COUNT" };
    let key = descriptor.key();

    let mut parts = vec![
        format!(
            "SELECT {}({}) AS {}",
            function,
            descriptor.qualified(&key.column),
            key.attribute
        ),
        format!("FROM {}", table_reference(descriptor, options)),
    ];
    parts.extend(join_clauses(descriptor)?);
    parts.push(format!("WHERE {}", predicate(descriptor, action, filter, options)?));

    Ok(parts.join(" "))
}

fn select_statement(
    descriptor: &EntityDescriptor,
    action: Action,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<String> {
    for attribute in options.visible.iter().chain(&options.group).chain(&options.sort) {
        if descriptor.column(attribute).is_none() {
            return Err(OrmError::StatementSynthesis(format!(
                "{} has no attribute '{}'",
                descriptor.type_name, attribute
            )));
        }
    }

    let mut selected: Vec<&ColumnDescriptor> = descriptor
        .columns
        .iter()
        .filter(|column| options.visible.is_empty() || options.visible.contains(&column.attribute))
        .collect();

    if !options.group.is_empty() {
        let (mut grouped, detail): (Vec<_>, Vec<_>) = selected
            .into_iter()
            .partition(|column| options.group.contains(&column.attribute));
        grouped.sort_by_key(|column| options.group.iter().position(|g| g == &column.attribute));
        grouped.extend(detail);
        selected = grouped;
    }

    let mut select_list = Vec::with_capacity(selected.len());
    for column in &selected {
        select_list.push(select_item(descriptor, column)?);
    }

    let mut head = String::from("SELECT");
    if options.limit > 0 && options.dialect.uses_top() {
        head.push_str(&format!(" TOP {}", options.limit));
    }

    let mut parts = vec![
        format!("{} {}", head, select_list.join(", ")),
        format!("FROM {}", table_reference(descriptor, options)),
    ];
    parts.extend(join_clauses(descriptor)?);
    parts.push(format!("WHERE {}", predicate(descriptor, action, filter, options)?));

    if !options.group.is_empty() {
        let grouping: Vec<String> = selected
            .iter()
            .filter(|column| column.aggregate.is_none())
            .map(|column| column_expression(descriptor, column))
            .collect();
        parts.push(format!("GROUP BY {}", grouping.join(", ")));
    }

    if !options.sort.is_empty() {
        let ordering: Vec<String> = options
            .sort
            .iter()
            .filter_map(|attribute| descriptor.column(attribute))
            .map(|column| match column.aggregate {
                Some(_) => column.output_name().to_string(),
                None => column_expression(descriptor, column),
            })
            .collect();
        parts.push(format!("ORDER BY {} {}", ordering.join(", "), options.direction));
    }

    if options.limit > 0 && !options.dialect.uses_top() {
        parts.push(format!("LIMIT {}", options.limit));
    }

    Ok(parts.join(" "))
}

fn table_reference(descriptor: &EntityDescriptor, options: &QueryOptions) -> String {
    if options.read_uncommitted && options.dialect.supports_nolock() {
        format!("{} (NOLOCK)", descriptor.table)
    } else {
        descriptor.table.clone()
    }
}

/// Qualified column expression without alias
fn column_expression(descriptor: &EntityDescriptor, column: &ColumnDescriptor) -> String {
    match &column.join {
        Some(join) => format!("{}.{}", join.table, join.column),
        None => descriptor.qualified(&column.column),
    }
}

fn select_item(descriptor: &EntityDescriptor, column: &ColumnDescriptor) -> OrmResult<String> {
    if let Some(aggregate) = &column.aggregate {
        if aggregate.source_column.trim().is_empty() {
            return Err(OrmError::StatementSynthesis(format!(
                "aggregate attribute '{}' has no source column",
                column.attribute
            )));
        }
        return Ok(format!(
            "{}({}) AS {}",
            aggregate.aggregation.function(),
            descriptor.qualified(&aggregate.source_column),
            column.output_name()
        ));
    }

    let (expression, physical) = match &column.join {
        Some(join) => (format!("{}.{}", join.table, join.column), join.column.as_str()),
        None => (descriptor.qualified(&column.column), column.column.as_str()),
    };

    if physical == column.output_name() {
        Ok(expression)
    } else {
        Ok(format!("{} AS {}", expression, column.output_name()))
    }
}

/// Join clauses in declaration order, each emitted once
fn join_clauses(descriptor: &EntityDescriptor) -> OrmResult<Vec<String>> {
    let mut clauses: Vec<String> = Vec::new();

    for column in &descriptor.columns {
        let join = match &column.join {
            Some(join) => join,
            None => continue,
        };

        if [&join.table, &join.column, &join.key_column, &join.foreign_key_column]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return Err(OrmError::StatementSynthesis(format!(
                "join for attribute '{}' needs a table, a column and both join columns",
                column.attribute
            )));
        }

        let clause = match &join.junction {
            None => format!(
                "{} {} ON {} = {}.{}",
                join.kind,
                join.table,
                descriptor.qualified(&join.key_column),
                join.table,
                join.foreign_key_column
            ),
            Some(junction) => format!(
                "{kind} {jt} ON {owner} = {jt}.{owner_col} {kind} {t} ON {jt}.{target_col} = {t}.{fk}",
                kind = join.kind,
                jt = junction.table,
                owner = descriptor.qualified(&join.key_column),
                owner_col = junction.owner_column,
                t = join.table,
                target_col = junction.target_column,
                fk = join.foreign_key_column
            ),
        };

        if !clauses.contains(&clause) {
            clauses.push(clause);
        }
    }

    Ok(clauses)
}

/// `WHERE` body built from the set attributes of `filter` and the range map
fn predicate(
    descriptor: &EntityDescriptor,
    action: Action,
    filter: &Record,
    options: &QueryOptions,
) -> OrmResult<String> {
    let mut terms: Vec<(String, &'static str)> = Vec::new();

    for column in &descriptor.columns {
        if column.aggregate.is_some() {
            continue;
        }

        let target = match &column.join {
            None => descriptor.qualified(&column.column),
            Some(join) if action == Action::List && join.filterable => format!("{}.{}", join.table, join.column),
            Some(_) => continue,
        };

        if let Some((low, high)) = options.ranges.get(&column.attribute) {
            terms.push((format!("{} BETWEEN {} AND {}", target, low, high), AND));
            continue;
        }

        let value = match filter.get(&column.attribute) {
            Some(value) if !is_unset(value) => value,
            _ => continue,
        };

        match value {
            Value::Bool(true) => terms.push((format!("{} = 1", target), AND)),
            Value::Bool(false) if action == Action::Edit => terms.push((format!("{} = 0", target), AND)),
            Value::Bool(false) | Value::Array(_) | Value::Object(_) => {}
            _ if is_fuzzy(action, value, &target) => {
                let pattern = literal::raw_text(value).replace('\'', "");
                terms.push((format!("{} LIKE '%{}%'", target, pattern), OR));
            }
            _ => terms.push((format!("{} = {}", target, literal::render(&column.attribute, value)?), AND)),
        }
    }

    if terms.is_empty() {
        return Ok(EMPTY_PREDICATE.to_string());
    }

    let last = terms.len() - 1;
    let mut predicate = String::new();
    for (index, (term, joiner)) in terms.into_iter().enumerate() {
        predicate.push_str(&term);
        if index < last {
            predicate.push(' ');
            predicate.push_str(joiner);
            predicate.push(' ');
        }
    }
    Ok(predicate)
}

/// Text matches turn into `LIKE` on list and count reads, except on columns
/// that look like identifiers or dates
fn is_fuzzy(action: Action, value: &Value, qualified_column: &str) -> bool {
    if !action.allows_fuzzy() || literal::is_integral(value) {
        return false;
    }
    let name = qualified_column.to_lowercase();
    !(name.contains("date") || name.starts_with("id") || name.ends_with("id") || name.contains(".id"))
}

fn attribute_value<'a>(entity: &'a Record, column: &ColumnDescriptor) -> &'a Value {
    entity.get(&column.attribute).unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Dialect;
    use crate::model::record::to_record;
    use crate::model::{describe, Aggregation, ColumnSchema, Entity, EntitySchema, JoinConfig};
    use crate::query::OrderDirection;
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Sample {
        doc_number: i64,
        creation_date: Option<chrono::NaiveDateTime>,
        name: Option<String>,
        age: Option<i32>,
        height: Option<f64>,
        weight: Option<f64>,
        active: bool,
    }

    impl Entity for Sample {
        fn schema() -> EntitySchema {
            EntitySchema::new()
                .table("sample_entity")
                .column(ColumnSchema::key("doc_number"))
                .column(ColumnSchema::new("creation_date"))
                .column(ColumnSchema::new("name").filterable())
                .column(ColumnSchema::new("age"))
                .column(ColumnSchema::new("height"))
                .column(ColumnSchema::new("weight"))
                .column(ColumnSchema::new("active"))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Shipment {
        id: i64,
        customer_id: i64,
        customer_name: Option<String>,
        tag_label: Option<String>,
        total_weight: Option<f64>,
        status: Option<String>,
    }

    impl Entity for Shipment {
        fn schema() -> EntitySchema {
            EntitySchema::new()
                .table("shipment")
                .column(ColumnSchema::key("id").column("shipment_id"))
                .column(ColumnSchema::new("customer_id"))
                .column(
                    ColumnSchema::new("customer_name").joined(
                        JoinConfig::mandatory("customer", "name").on("customer_id", "id").filterable(),
                    ),
                )
                .column(
                    ColumnSchema::new("tag_label").joined(
                        JoinConfig::optional("tag", "label")
                            .on("shipment_id", "id")
                            .through("shipment_tag", "shipment_id", "tag_id"),
                    ),
                )
                .column(ColumnSchema::new("total_weight").aggregate(Aggregation::Sum, "weight"))
                .column(ColumnSchema::new("status").column("shipment_status"))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct BrokenJoin {
        id: i64,
        other: Option<String>,
    }

    impl Entity for BrokenJoin {
        fn schema() -> EntitySchema {
            EntitySchema::new()
                .table("broken")
                .column(ColumnSchema::key("id"))
                .column(ColumnSchema::new("other").joined(JoinConfig::optional("", "name")))
        }
    }

    fn sample(record: Sample) -> Record {
        to_record(&record).unwrap()
    }

    fn mysql() -> QueryOptions {
        QueryOptions::new(Dialect::MySql)
    }

    fn run(action: Action, entity: &Record, filter: Option<&Record>, options: &QueryOptions) -> String {
        let descriptor = describe::<Sample>().unwrap();
        synthesize(&descriptor, action, entity, filter, options).unwrap()
    }

    #[test]
    fn test_get_by_key() {
        let filter = sample(Sample {
            doc_number: 12345,
            ..Default::default()
        });
        let sql = run(Action::Get, &filter, None, &mysql());

        assert!(sql.starts_with("SELECT sample_entity.doc_number, sample_entity.creation_date"));
        assert!(sql.ends_with("WHERE sample_entity.doc_number = 12345"));
    }

    #[test]
    fn test_list_uses_fuzzy_match_for_text() {
        let filter = sample(Sample {
            name: Some("roberto".into()),
            ..Default::default()
        });
        let sql = run(Action::List, &filter, None, &mysql());

        assert!(sql.contains("WHERE sample_entity.name LIKE '%roberto%'"));
        assert!(!sql.contains("  "));
        assert_eq!(sql, sql.trim_end());
    }

    #[test]
    fn test_get_uses_equality_for_text() {
        let filter = sample(Sample {
            name: Some("o'neil".into()),
            ..Default::default()
        });
        let sql = run(Action::Get, &filter, None, &mysql());
        assert!(sql.ends_with("WHERE sample_entity.name = 'o''neil'"));
    }

    #[test]
    fn test_create_excludes_key() {
        let created = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let entity = sample(Sample {
            doc_number: 0,
            creation_date: Some(created),
            name: Some("roberto".into()),
            active: true,
            ..Default::default()
        });
        let sql = run(Action::Create, &entity, None, &mysql());

        assert_eq!(
            sql,
            "INSERT INTO sample_entity (creation_date, name, age, height, weight, active) \
             VALUES ('2024-01-15 09:30:00', 'roberto', NULL, NULL, NULL, 1)"
        );
        assert!(!sql.contains("doc_number"));
    }

    #[test]
    fn test_edit_filters_by_key() {
        let entity = sample(Sample {
            doc_number: 12345,
            name: Some("roberto".into()),
            age: Some(40),
            ..Default::default()
        });
        let sql = run(Action::Edit, &entity, None, &mysql());

        assert!(sql.starts_with("UPDATE sample_entity SET"));
        assert!(sql.contains("SET creation_date = NULL, name = 'roberto', age = 40"));
        assert!(sql.ends_with("WHERE sample_entity.doc_number = 12345"));
    }

    #[test]
    fn test_edit_renders_false_filters() {
        let entity = sample(Sample {
            doc_number: 1,
            ..Default::default()
        });
        let mut filter = Record::new();
        filter.insert("active".into(), json!(false));
        let sql = run(Action::Edit, &entity, Some(&filter), &mysql());
        assert!(sql.ends_with("WHERE sample_entity.active = 0"));

        let listed = run(Action::List, &filter, None, &mysql());
        assert!(listed.ends_with("WHERE 1 = 1"));
    }

    #[test]
    fn test_count_shares_predicate() {
        let filter = sample(Sample {
            name: Some("roberto".into()),
            ..Default::default()
        });
        let count = run(Action::Count, &filter, None, &mysql());
        let list = run(Action::List, &filter, None, &mysql());

        assert!(count.starts_with("SELECT COUNT(sample_entity.doc_number) AS doc_number FROM sample_entity"));
        let predicate = |sql: &str| sql.split(" WHERE ").nth(1).map(str::to_string);
        assert_eq!(predicate(&count), predicate(&list));
    }

    #[test]
    fn test_max_selects_highest_key() {
        let sql = run(Action::Max, &Record::new(), None, &mysql());
        assert_eq!(sql, "SELECT MAX(sample_entity.doc_number) AS doc_number FROM sample_entity WHERE 1 = 1");
    }

    #[test]
    fn test_limit_per_dialect() {
        let filter = sample(Sample {
            doc_number: 7,
            ..Default::default()
        });
        let plain = run(Action::List, &filter, None, &mysql());
        let limited = run(Action::List, &filter, None, &mysql().with_limit(5));
        assert_eq!(limited, format!("{} LIMIT 5", plain));

        let server = QueryOptions::new(Dialect::SqlServer).with_limit(5);
        let top = run(Action::List, &filter, None, &server);
        assert!(top.starts_with("SELECT TOP 5 sample_entity.doc_number"));
        assert!(top.ends_with("WHERE sample_entity.doc_number = 7"));
    }

    #[test]
    fn test_read_uncommitted_hint_only_on_sql_server() {
        let server = QueryOptions::new(Dialect::SqlServer).with_read_uncommitted(true);
        let sql = run(Action::List, &Record::new(), None, &server);
        assert!(sql.contains("FROM sample_entity (NOLOCK) WHERE"));

        let sqlite = QueryOptions::new(Dialect::Sqlite).with_read_uncommitted(true);
        assert!(!run(Action::List, &Record::new(), None, &sqlite).contains("NOLOCK"));
    }

    #[test]
    fn test_ranges_order_and_visibility() {
        let options = mysql()
            .with_visible(["name", "age"])
            .with_range("age", 18.0, 30.5)
            .with_sort(["name"], OrderDirection::Desc);
        let filter = sample(Sample {
            active: true,
            ..Default::default()
        });
        let sql = run(Action::List, &filter, None, &options);

        assert_eq!(
            sql,
            "SELECT sample_entity.name, sample_entity.age FROM sample_entity \
             WHERE sample_entity.age BETWEEN 18 AND 30.5 AND sample_entity.active = 1 \
             ORDER BY sample_entity.name DESC"
        );
    }

    #[test]
    fn test_fuzzy_and_exact_joiners() {
        let filter = sample(Sample {
            name: Some("ana".into()),
            age: Some(30),
            ..Default::default()
        });
        let sql = run(Action::List, &filter, None, &mysql());
        assert!(sql.ends_with("WHERE sample_entity.name LIKE '%ana%' OR sample_entity.age = 30"));
    }

    #[test]
    fn test_joins_aliases_and_aggregates() {
        let descriptor = describe::<Shipment>().unwrap();
        let mut filter = to_record(&Shipment::default()).unwrap();
        filter.insert("customer_name".into(), json!("acme"));
        filter.insert("status".into(), json!("open"));

        let sql = synthesize(&descriptor, Action::List, &filter, None, &mysql()).unwrap();

        assert_eq!(
            sql,
            "SELECT shipment.shipment_id AS id, shipment.customer_id, customer.name AS customer_name, \
             tag.label AS tag_label, SUM(shipment.weight) AS total_weight, shipment.shipment_status AS status \
             FROM shipment \
             INNER JOIN customer ON shipment.customer_id = customer.id \
             LEFT JOIN shipment_tag ON shipment.shipment_id = shipment_tag.shipment_id \
             LEFT JOIN tag ON shipment_tag.tag_id = tag.id \
             WHERE customer.name LIKE '%acme%' OR shipment.shipment_status LIKE '%open%'"
        );

        let get = synthesize(&descriptor, Action::Get, &filter, None, &mysql()).unwrap();
        assert!(get.ends_with("WHERE shipment.shipment_status = 'open'"));
    }

    #[test]
    fn test_identifier_like_columns_never_fuzzy() {
        let descriptor = describe::<Shipment>().unwrap();
        let mut filter = Record::new();
        filter.insert("customer_id".into(), json!("abc"));
        let sql = synthesize(&descriptor, Action::List, &filter, None, &mysql()).unwrap();
        assert!(sql.ends_with("WHERE shipment.customer_id = 'abc'"));
    }

    #[test]
    fn test_grouping_puts_grouped_columns_first() {
        let descriptor = describe::<Shipment>().unwrap();
        let options = mysql().with_visible(["id", "customer_id", "total_weight"]).with_group(["customer_id"]);
        let sql = synthesize(&descriptor, Action::List, &Record::new(), None, &options).unwrap();

        assert!(sql.starts_with(
            "SELECT shipment.customer_id, shipment.shipment_id AS id, SUM(shipment.weight) AS total_weight FROM shipment"
        ));
        assert!(sql.ends_with("WHERE 1 = 1 GROUP BY shipment.customer_id, shipment.shipment_id"));
    }

    #[test]
    fn test_malformed_descriptors_fail() {
        let descriptor = describe::<BrokenJoin>().unwrap();
        let result = synthesize(&descriptor, Action::List, &Record::new(), None, &mysql());
        assert!(matches!(result, Err(OrmError::StatementSynthesis(_))));

        let shipment = describe::<Shipment>().unwrap();
        let unknown = mysql().with_sort(["nope"], OrderDirection::Asc);
        assert!(synthesize(&shipment, Action::List, &Record::new(), None, &unknown).is_err());
    }

    #[test]
    fn test_delete_and_persistence_action() {
        let descriptor = describe::<Sample>().unwrap();
        let entity = sample(Sample {
            doc_number: 5,
            ..Default::default()
        });
        let sql = synthesize(&descriptor, Action::Delete, &entity, None, &mysql()).unwrap();
        assert_eq!(sql, "DELETE FROM sample_entity WHERE sample_entity.doc_number = 5");

        assert_eq!(persistence_action(&descriptor, &entity), Action::Edit);
        assert_eq!(persistence_action(&descriptor, &sample(Sample::default())), Action::Create);
    }

    #[test]
    fn test_write_restriction() {
        let descriptor = describe::<Sample>().unwrap();
        let unset = sample(Sample::default());
        assert!(!restricts(&descriptor, Action::Delete, &unset));
        assert!(restricts(&descriptor, Action::Edit, &unset));

        let keyed = sample(Sample {
            doc_number: 8,
            ..Default::default()
        });
        assert!(restricts(&descriptor, Action::Delete, &keyed));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let filter = sample(Sample {
            name: Some("roberto".into()),
            height: Some(1.8),
            ..Default::default()
        });
        let options = mysql().with_limit(3).with_sort(["age"], OrderDirection::Asc);
        assert_eq!(
            run(Action::List, &filter, None, &options),
            run(Action::List, &filter, None, &options)
        );
    }
}

use super::{parse, Assignment, Filter, OrderBy, Select, SetValue, Statement};
use crate::error::Result;
use crate::ident;
use crate::record::{self, is_truthy, loose_eq, numeric_value, Record, CREATED_AT};
use crate::store::Store;
use serde::Serialize;
use serde_json::Value;

/// Outcome of running a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    /// Matched records, for SELECT.
    Rows(Vec<Record>),
    /// Write metadata, for INSERT/UPDATE/DELETE.
    Meta(ResultMeta),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    pub affected_rows: usize,
}

impl ExecResult {
    fn affected(affected_rows: usize) -> Self {
        ExecResult::Meta(ResultMeta {
            insert_id: None,
            affected_rows,
        })
    }

    /// The rows of a SELECT; empty for write results.
    pub fn rows(&self) -> &[Record] {
        match self {
            ExecResult::Rows(rows) => rows,
            ExecResult::Meta(_) => &[],
        }
    }

    pub fn affected_rows(&self) -> usize {
        match self {
            ExecResult::Rows(_) => 0,
            ExecResult::Meta(meta) => meta.affected_rows,
        }
    }

    pub fn insert_id(&self) -> Option<&str> {
        match self {
            ExecResult::Rows(_) => None,
            ExecResult::Meta(meta) => meta.insert_id.as_deref(),
        }
    }

    /// The `[rows]` shape a conventional SQL driver returns: a one-element
    /// array wrapping either the row list or the write metadata object.
    pub fn into_driver_tuple(self) -> Value {
        let inner = match self {
            ExecResult::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            ExecResult::Meta(meta) => {
                let mut obj = serde_json::Map::new();
                if let Some(id) = meta.insert_id {
                    obj.insert("insertId".into(), Value::String(id));
                }
                obj.insert("affectedRows".into(), Value::from(meta.affected_rows));
                Value::Object(obj)
            }
        };
        Value::Array(vec![inner])
    }
}

impl Store {
    /// Parse and run a SQL-subset statement with positional parameters.
    ///
    /// An unknown table fails with `StoreError::UnknownTable`; a statement the
    /// interpreter does not understand fails with `UnsupportedStatement` or
    /// `SqlParse`. A query that matches nothing is `Ok` with no rows.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let statement = parse(sql, params)?;
        self.run(statement)
    }

    /// Like [`Store::execute`], but unknown tables and unsupported statements
    /// come back as an empty row list, the way callers written against a real
    /// driver expect. I/O failures still propagate.
    pub fn execute_or_empty(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        match self.execute(sql, params) {
            Err(e) if e.is_unsupported() => {
                log::debug!("Returning empty result for '{sql}': {e}");
                Ok(ExecResult::Rows(Vec::new()))
            }
            other => other,
        }
    }

    /// Run an already-built statement.
    pub fn run(&self, statement: Statement) -> Result<ExecResult> {
        log::debug!("Running statement on {}: {:?}", statement.table(), statement);
        match statement {
            Statement::Select(select) => Ok(ExecResult::Rows(self.run_select(&select))),

            Statement::Insert { table, values } => {
                let created = self.table(table).create(resolve(values))?;
                Ok(ExecResult::Meta(ResultMeta {
                    insert_id: record::record_id(&created).map(str::to_string),
                    affected_rows: 1,
                }))
            }

            Statement::Update { table, id, set } => {
                let Some(id) = record::scalar_text(&id) else {
                    return Ok(ExecResult::affected(0));
                };
                let updated = self.table(table).update(&id, resolve(set))?;
                Ok(ExecResult::affected(usize::from(updated.is_some())))
            }

            Statement::Delete { table, id } => {
                let Some(id) = record::scalar_text(&id) else {
                    return Ok(ExecResult::affected(0));
                };
                let deleted = self.table(table).delete(&id)?;
                Ok(ExecResult::affected(usize::from(deleted)))
            }
        }
    }

    fn run_select(&self, select: &Select) -> Vec<Record> {
        let mut rows: Vec<Record> = self
            .table(select.table)
            .get_all()
            .into_iter()
            .filter(|row| select.filters.iter().all(|f| matches_filter(row, f)))
            .collect();

        match select.order {
            Some(OrderBy::CreatedAtDesc) => {
                // Stable sort; records without a parseable timestamp go last.
                rows.sort_by_key(|row| {
                    std::cmp::Reverse(
                        row.get(CREATED_AT)
                            .and_then(Value::as_str)
                            .and_then(ident::parse_timestamp),
                    )
                });
            }
            Some(OrderBy::SortOrderAsc) => {
                rows.sort_by(|a, b| {
                    numeric_value(a.get("sort_order")).total_cmp(&numeric_value(b.get("sort_order")))
                });
            }
            None => {}
        }

        rows.into_iter()
            .skip(select.offset.unwrap_or(0))
            .take(select.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn matches_filter(row: &Record, filter: &Filter) -> bool {
    let field_equals = |field: &str, expected: &Value| {
        row.get(field).map_or(false, |actual| loose_eq(actual, expected))
    };
    match filter {
        Filter::IsActive => row.get("is_active").map_or(false, is_truthy),
        Filter::Id(id) => field_equals("id", id),
        Filter::Slug(slug) => field_equals("slug", slug),
        Filter::FieldEquals(field, value) => field_equals(field.as_str(), value),
    }
}

/// Turn assignments into record fields, resolving `NOW()`.
fn resolve(assignments: Vec<Assignment>) -> Record {
    assignments
        .into_iter()
        .map(|Assignment { field, value }| {
            let value = match value {
                SetValue::Value(value) => value,
                SetValue::Now => Value::String(ident::now_timestamp()),
            };
            (field, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::registry::Table;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn seed(store: &Store, table: Table, rows: Value) {
        let Value::Array(rows) = rows else {
            panic!("seed rows must be an array");
        };
        store.table(table).restore(rows).unwrap();
    }

    fn ids(result: &ExecResult) -> Vec<&str> {
        result
            .rows()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_select_is_active() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Pages,
            json!([{"id": "1", "is_active": true}, {"id": "2", "is_active": false}]),
        );

        let result = store.execute("SELECT * FROM pages WHERE is_active = 1", &[]).unwrap();
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_select_is_active_parameterised() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Pages,
            json!([{"id": "1", "is_active": true}, {"id": "2", "is_active": false}]),
        );

        let sql = "SELECT * FROM pages WHERE is_active = ?";
        assert_eq!(ids(&store.execute(sql, &[json!(1)]).unwrap()), vec!["1"]);
        assert_eq!(ids(&store.execute(sql, &[json!(true)]).unwrap()), vec!["1"]);
        assert_eq!(ids(&store.execute(sql, &[json!(0)]).unwrap()), vec!["2"]);
        assert_eq!(ids(&store.execute(sql, &[json!(false)]).unwrap()), vec!["2"]);
    }

    #[test]
    fn test_select_id_tolerates_numbers() {
        let (_tmp, store) = setup_test_store();
        seed(&store, Table::Menus, json!([{"id": 1, "label": "Home"}, {"id": 2}]));

        let result = store
            .execute("SELECT * FROM menus WHERE id = ?", &[json!("1")])
            .unwrap();
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0]["label"], "Home");
    }

    #[test]
    fn test_select_filters_compose() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Pages,
            json!([
                {"id": "1", "slug": "about", "is_active": true},
                {"id": "2", "slug": "about", "is_active": false},
                {"id": "3", "slug": "home", "is_active": true},
            ]),
        );

        let result = store
            .execute(
                "SELECT * FROM pages WHERE slug = ? AND is_active = 1",
                &[json!("about")],
            )
            .unwrap();
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_select_generic_field() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::BlogPosts,
            json!([
                {"id": "a", "category_id": "c1"},
                {"id": "b", "category_id": "c2"},
                {"id": "c"},
            ]),
        );

        let result = store
            .execute("SELECT * FROM blog_posts WHERE category_id = ?", &[json!("c2")])
            .unwrap();
        assert_eq!(ids(&result), vec!["b"]);
    }

    #[test]
    fn test_order_limit_offset() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::BlogPosts,
            json!([
                {"id": "old", "created_at": "2026-01-01T00:00:00.000Z"},
                {"id": "new", "created_at": "2026-03-01T00:00:00.000Z"},
                {"id": "mid", "created_at": "2026-02-01T00:00:00.000Z"},
                {"id": "none"},
            ]),
        );

        let result = store
            .execute("SELECT * FROM blog_posts ORDER BY created_at DESC", &[])
            .unwrap();
        assert_eq!(ids(&result), vec!["new", "mid", "old", "none"]);

        let result = store
            .execute("SELECT * FROM blog_posts ORDER BY created_at DESC LIMIT 2 OFFSET 1", &[])
            .unwrap();
        assert_eq!(ids(&result), vec!["mid", "old"]);

        let result = store
            .execute("SELECT * FROM blog_posts ORDER BY title DESC", &[])
            .unwrap();
        assert_eq!(ids(&result), vec!["old", "new", "mid", "none"]);
    }

    #[test]
    fn test_order_by_sort_order() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Menus,
            json!([
                {"id": "c", "sort_order": 3},
                {"id": "a", "sort_order": 1},
                {"id": "z"},
                {"id": "b", "sort_order": "2"},
            ]),
        );

        let result = store.execute("SELECT * FROM menus ORDER BY sort_order", &[]).unwrap();
        assert_eq!(ids(&result), vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn test_insert() {
        let (_tmp, store) = setup_test_store();
        let result = store
            .execute(
                "INSERT INTO pages (title, slug, content, is_active) VALUES (?, ?, ?, ?)",
                &[json!("Home"), json!("home"), json!("<h1>Hi</h1>"), json!(1)],
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        let id = result.insert_id().unwrap().to_string();

        let page = store.table(Table::Pages).get_by_id(&id).unwrap();
        assert_eq!(page["title"], "Home");
        assert_eq!(page["slug"], "home");
        assert_eq!(page["is_active"], 1);
        assert!(page["created_at"].is_string());
    }

    #[test]
    fn test_insert_without_columns_uses_fixed_fields() {
        let (_tmp, store) = setup_test_store();
        let result = store
            .execute(
                "INSERT INTO popups VALUES (?, ?)",
                &[json!("Spring sale"), json!("spring-sale")],
            )
            .unwrap();
        let popup = store
            .table(Table::Popups)
            .get_by_id(result.insert_id().unwrap())
            .unwrap();
        assert_eq!(popup["title"], "Spring sale");
        assert_eq!(popup["slug"], "spring-sale");
        assert!(popup.get("content").is_none());
    }

    #[test]
    fn test_update_field_isolation() {
        let (_tmp, store) = setup_test_store();
        let stamp = "2026-01-01T00:00:00.000Z";
        seed(
            &store,
            Table::Pages,
            json!([{"id": "5", "title": "Old", "views": 3, "created_at": stamp, "updated_at": stamp}]),
        );

        let result = store
            .execute(
                "UPDATE pages SET title = ?, updated_at = NOW() WHERE id = ?",
                &[json!("New"), json!("5")],
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 1);

        let page = store.table(Table::Pages).get_by_id("5").unwrap();
        assert_eq!(page["title"], "New");
        assert_eq!(page["views"], 3);
        assert_eq!(page["created_at"], stamp);
        assert!(page["updated_at"].as_str().unwrap() > stamp);
    }

    #[test]
    fn test_update_and_delete_with_trailing_clauses() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Pages,
            json!([{"id": "5", "title": "Old", "is_active": true}, {"id": "6", "title": "Other"}]),
        );

        let result = store
            .execute(
                "UPDATE pages SET title = ? WHERE id = ? LIMIT 1",
                &[json!("New"), json!("5")],
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(store.table(Table::Pages).get_by_id("5").unwrap()["title"], "New");

        let result = store
            .execute_or_empty(
                "UPDATE pages SET title = ? WHERE id = ? AND is_active = 1",
                &[json!("Newer"), json!("5")],
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(store.table(Table::Pages).get_by_id("5").unwrap()["title"], "Newer");

        let result = store
            .execute("DELETE FROM pages WHERE id = ? LIMIT 1", &[json!("6")])
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(ids(&ExecResult::Rows(store.table(Table::Pages).get_all())), vec!["5"]);
    }

    #[test]
    fn test_update_and_delete_missing() {
        let (_tmp, store) = setup_test_store();
        let result = store
            .execute("UPDATE pages SET title = ? WHERE id = ?", &[json!("x"), json!("nope")])
            .unwrap();
        assert_eq!(result.affected_rows(), 0);

        let result = store
            .execute("DELETE FROM pages WHERE id = ?", &[json!("nope")])
            .unwrap();
        assert_eq!(result.affected_rows(), 0);
    }

    #[test]
    fn test_delete() {
        let (_tmp, store) = setup_test_store();
        seed(&store, Table::Media, json!([{"id": "m1"}, {"id": "m2"}]));

        let result = store
            .execute("DELETE FROM media WHERE id = ?", &[json!("m1")])
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(store.table(Table::Media).count(), 1);
    }

    #[test]
    fn test_distinct_outcomes() {
        let (_tmp, store) = setup_test_store();

        let empty = store.execute("SELECT * FROM pages", &[]).unwrap();
        assert!(empty.rows().is_empty());

        assert!(matches!(
            store.execute("SELECT * FROM orders", &[]),
            Err(StoreError::UnknownTable(_))
        ));
        assert!(matches!(
            store.execute("TRUNCATE pages", &[]),
            Err(StoreError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn test_execute_or_empty() {
        let (_tmp, store) = setup_test_store();
        for sql in [
            "SELECT * FROM orders",
            "UPDATE orders SET a = ? WHERE id = ?",
            "SHOW TABLES",
            "UPDATE pages SET title = ?",
        ] {
            let result = store.execute_or_empty(sql, &[json!("x")]).unwrap();
            assert_eq!(result, ExecResult::Rows(vec![]), "{sql}");
        }
    }

    #[test]
    fn test_run_structured_statement() {
        let (_tmp, store) = setup_test_store();
        seed(
            &store,
            Table::Services,
            json!([{"id": "s1", "is_active": true}, {"id": "s2", "is_active": 0}]),
        );

        let mut select = Select::all(Table::Services);
        select.filters.push(Filter::IsActive);
        let result = store.run(Statement::Select(select)).unwrap();
        assert_eq!(ids(&result), vec!["s1"]);
    }

    #[test]
    fn test_driver_tuple_shape() {
        let rows = ExecResult::Rows(vec![]).into_driver_tuple();
        assert_eq!(rows, json!([[]]));

        let meta = ExecResult::Meta(ResultMeta {
            insert_id: Some("abc".into()),
            affected_rows: 1,
        })
        .into_driver_tuple();
        assert_eq!(meta, json!([{"insertId": "abc", "affectedRows": 1}]));

        let meta = ExecResult::affected(0).into_driver_tuple();
        assert_eq!(meta, json!([{"affectedRows": 0}]));
    }
}

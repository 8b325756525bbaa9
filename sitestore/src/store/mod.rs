use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::ident::{self, IdGenerator};
use crate::persist::{self, WriteOptions};
use crate::record::{
    self, loose_eq, Page, Record, CREATED_AT, ID, RESERVED_FIELDS, UPDATED_AT,
};
use crate::registry::Table;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The main entry point for SiteStore.
/// Owns the data directory and hands out table handles for CRUD operations.
///
/// Each table has its own writer lock: a read-modify-write cycle on a table
/// holds the lock from the read until the rewritten file is in place, so
/// concurrent mutations of one table are applied one after another.
pub struct Store {
    root: PathBuf,
    config: StoreConfig,
    ids: IdGenerator,
    locks: Vec<Mutex<()>>,
}

impl Store {
    /// Open a store at the given data directory, creating it if needed.
    /// Reads `sitestore.yaml` from the directory when present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let config = StoreConfig::load(&root)?;
        Self::open_with_config(root, config)
    }

    /// Open a store with an explicit configuration, ignoring any config file.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        log::debug!("Opened store at {} ({:?} ids)", root.display(), config.id_strategy);

        Ok(Store {
            ids: IdGenerator::new(config.id_strategy),
            locks: Table::ALL.iter().map(|_| Mutex::new(())).collect(),
            root,
            config,
        })
    }

    /// Get a handle to a table.
    pub fn table(&self, table: Table) -> TableHandle<'_> {
        TableHandle { store: self, table }
    }

    /// Get a handle by textual table name.
    pub fn table_named(&self, name: &str) -> Result<TableHandle<'_>> {
        let table = name.parse::<Table>()?;
        Ok(self.table(table))
    }

    /// Get the root data directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Absolute path of a table's backing file.
    pub fn table_path(&self, table: Table) -> PathBuf {
        self.root.join(table.file_name())
    }

    /// Per-table record counts, file presence, and any `*.json` files in the
    /// data directory that do not belong to a known table.
    pub fn status(&self) -> Result<Value> {
        let mut tables = serde_json::Map::new();
        for table in Table::ALL {
            let handle = self.table(table);
            tables.insert(
                table.name().to_string(),
                serde_json::json!({
                    "file": table.file_name(),
                    "exists": handle.path().exists(),
                    "count": handle.count(),
                }),
            );
        }

        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&self.root.to_string_lossy())
        );
        let mut stray = Vec::new();
        for entry in glob::glob(&pattern)
            .map_err(|e| StoreError::Other(format!("Glob error: {e}")))?
        {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Unreadable entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };
            let file_name = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            if !Table::ALL.iter().any(|t| t.file_name() == file_name) {
                log::warn!("Stray file in data directory: {}", path.display());
                stray.push(Value::String(file_name));
            }
        }

        Ok(serde_json::json!({
            "data_dir": self.root.display().to_string(),
            "id_strategy": self.config.id_strategy,
            "tables": tables,
            "stray_files": stray,
        }))
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            pretty: self.config.pretty,
            atomic: self.config.atomic_writes,
        }
    }

    /// Build a new record from caller fields: fresh id, both timestamps set to now.
    /// Caller-supplied values for the reserved fields are dropped.
    pub(crate) fn stamp_new(&self, fields: Record) -> Record {
        let now = ident::now_timestamp();
        let mut record = Record::new();
        record.insert(ID.into(), Value::String(self.ids.next_id()));
        for (key, value) in fields {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                record.insert(key, value);
            }
        }
        record.insert(CREATED_AT.into(), Value::String(now.clone()));
        record.insert(UPDATED_AT.into(), Value::String(now));
        record
    }
}

/// A handle to one table within a store.
/// Every read loads the table file; every write rewrites it in full.
#[derive(Clone, Copy)]
pub struct TableHandle<'a> {
    store: &'a Store,
    table: Table,
}

impl<'a> TableHandle<'a> {
    pub fn table(&self) -> Table {
        self.table
    }

    pub fn path(&self) -> PathBuf {
        self.store.table_path(self.table)
    }

    fn lock(&self) -> MutexGuard<'a, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state.
        self.store.locks[self.table.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Vec<Value> {
        persist::read_table(&self.path())
    }

    fn save(&self, items: &[Value]) -> Result<()> {
        persist::write_table(&self.path(), items, self.store.write_options())
    }

    fn load_records(&self) -> Vec<Record> {
        self.load()
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                other => {
                    log::warn!("Skipping non-object entry in {}: {}", self.table, other);
                    None
                }
            })
            .collect()
    }

    fn position(items: &[Value], id: &str) -> Option<usize> {
        let id = Value::String(id.to_string());
        items
            .iter()
            .position(|item| item.get(ID).map_or(false, |v| loose_eq(v, &id)))
    }

    /// All records in the table. A missing or corrupt file yields an empty list.
    pub fn get_all(&self) -> Vec<Record> {
        let _guard = self.lock();
        self.load_records()
    }

    /// Number of records in the table.
    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    /// Get a record by id
    pub fn get_by_id(&self, id: &str) -> Option<Record> {
        let id = Value::String(id.to_string());
        self.get_all()
            .into_iter()
            .find(|record| record.get(ID).map_or(false, |v| loose_eq(v, &id)))
    }

    /// All records for which `predicate` returns true, in table order.
    pub fn get_where<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.get_all().into_iter().filter(|r| predicate(r)).collect()
    }

    /// Insert a new record and return it with its generated id and timestamps.
    pub fn create(&self, fields: Record) -> Result<Record> {
        let _guard = self.lock();
        let mut items = self.load();
        let record = self.store.stamp_new(fields);
        items.push(Value::Object(record.clone()));
        self.save(&items)?;
        log::debug!("Created {}/{}", self.table, record::record_id(&record).unwrap_or_default());
        Ok(record)
    }

    /// Insert many records with a single write.
    pub fn bulk_create(&self, list: Vec<Record>) -> Result<Vec<Record>> {
        let _guard = self.lock();
        let mut items = self.load();
        let created: Vec<Record> = list
            .into_iter()
            .map(|fields| self.store.stamp_new(fields))
            .collect();
        items.extend(created.iter().cloned().map(Value::Object));
        self.save(&items)?;
        log::debug!("Created {} records in {}", created.len(), self.table);
        Ok(created)
    }

    /// Shallow-merge `partial` onto the record with this id and refresh
    /// `updated_at`. Returns `None`, without writing, when no record matches.
    /// `id` and `created_at` never change.
    pub fn update(&self, id: &str, partial: Record) -> Result<Option<Record>> {
        let _guard = self.lock();
        let mut items = self.load();
        let Some(idx) = Self::position(&items, id) else {
            return Ok(None);
        };
        let Value::Object(record) = &mut items[idx] else {
            return Ok(None);
        };

        for (key, value) in partial {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                record.insert(key, value);
            }
        }

        let previous = [CREATED_AT, UPDATED_AT]
            .iter()
            .filter_map(|f| record.get(*f).and_then(Value::as_str))
            .max()
            .unwrap_or_default()
            .to_string();
        record.insert(
            UPDATED_AT.into(),
            Value::String(ident::timestamp_after(&previous)),
        );

        let updated = record.clone();
        self.save(&items)?;
        log::debug!("Updated {}/{}", self.table, id);
        Ok(Some(updated))
    }

    /// Remove the record with this id. Returns whether a record was removed;
    /// nothing is written when none matched.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock();
        let mut items = self.load();
        let Some(idx) = Self::position(&items, id) else {
            return Ok(false);
        };
        items.remove(idx);
        self.save(&items)?;
        log::debug!("Deleted {}/{}", self.table, id);
        Ok(true)
    }

    /// One page of all records. Pages are 1-based.
    pub fn get_paginated(&self, page: usize, limit: usize) -> Page<Record> {
        paginate(self.get_all(), page, limit)
    }

    /// One page of the records matching `predicate`; filtering happens before slicing.
    pub fn get_paginated_where<F>(&self, page: usize, limit: usize, predicate: F) -> Page<Record>
    where
        F: Fn(&Record) -> bool,
    {
        paginate(self.get_where(predicate), page, limit)
    }

    /// Case-insensitive substring search over the given fields. A record is
    /// returned once if any of the fields contains `term`.
    pub fn search(&self, term: &str, fields: &[&str]) -> Vec<Record> {
        let needle = term.to_lowercase();
        self.get_where(|record| {
            fields.iter().any(|field| {
                record
                    .get(*field)
                    .and_then(record::search_text)
                    .map_or(false, |text| text.to_lowercase().contains(&needle))
            })
        })
    }

    /// Remove every record from the table.
    pub fn truncate(&self) -> Result<()> {
        let _guard = self.lock();
        self.save(&[])?;
        log::info!("Truncated {}", self.table);
        Ok(())
    }

    /// Raw table contents, exactly as stored.
    pub fn backup(&self) -> Vec<Value> {
        let _guard = self.lock();
        self.load()
    }

    /// Replace the table contents with a raw snapshot. The snapshot is not validated.
    pub fn restore(&self, snapshot: Vec<Value>) -> Result<()> {
        let _guard = self.lock();
        self.save(&snapshot)?;
        log::info!("Restored {} entries into {}", snapshot.len(), self.table);
        Ok(())
    }

    // ── Typed API ───────────────────────────────────────────────────

    /// All records deserialized into `T`.
    pub fn get_all_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.get_all()
            .into_iter()
            .map(|record| Ok(serde_json::from_value(Value::Object(record))?))
            .collect()
    }

    /// A record by id, deserialized into `T`.
    pub fn get_by_id_as<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.get_by_id(id) {
            Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
            None => Ok(None),
        }
    }

    /// Insert a typed value. It must serialize to a JSON object.
    pub fn create_from<T: Serialize>(&self, value: &T) -> Result<Record> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => self.create(fields),
            other => Err(StoreError::Other(format!(
                "Cannot store non-object value in {}: {}",
                self.table, other
            ))),
        }
    }
}

fn paginate(records: Vec<Record>, page: usize, limit: usize) -> Page<Record> {
    let page = page.max(1);
    let total = records.len();
    let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
    let items = if limit == 0 {
        Vec::new()
    } else {
        records
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect()
    };

    Page {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

//! Semantic model access over a TMSL `model.bim` document.
//!
//! `SemanticModel` is the narrow object-model surface the model fixers use.
//! `BimModel` implements it on the JSON document and keeps every field it
//! does not understand, so a round trip only touches what a fixer changed.
//!
//! Columns added in the current batch have no identity until
//! `save_changes` runs; sort-by and hierarchies refuse to reference them.

use crate::domain::constants::MODEL_DEFINITION_FILE;
use crate::domain::error::{FixError, FixResult};
use crate::services::definition::{DefinitionPart, DefinitionStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub model: BimModelNode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimModelNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourage_implicit_measures: Option<bool>,
    #[serde(default)]
    pub tables: Vec<BimTable>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_category: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_group: Option<BimCalculationGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<BimColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hierarchies: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimCalculationGroup {
    #[serde(default)]
    pub precedence: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calculation_items: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimColumn {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by_column: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub data_category: Option<String>,
    pub precedence: Option<i64>,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub is_key: bool,
    pub is_hidden: bool,
}

/// Column definition shared by data and calculated-table columns.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec<'a> {
    pub name: &'a str,
    pub source_column: &'a str,
    pub data_type: &'a str,
    pub format_string: Option<&'a str>,
    pub is_key: bool,
    pub hidden: bool,
    pub summarize_by: &'a str,
    pub display_folder: Option<&'a str>,
}

pub trait SemanticModel {
    fn name(&self) -> &str;
    fn tables(&self) -> Vec<TableInfo>;
    fn discourage_implicit_measures(&self) -> bool;

    fn set_discourage_implicit_measures(&mut self, value: bool) -> FixResult<()>;
    fn add_table(&mut self, name: &str, hidden: bool) -> FixResult<()>;
    fn add_calculated_table(
        &mut self,
        name: &str,
        expression: &str,
        data_category: Option<&str>,
    ) -> FixResult<()>;
    fn add_m_partition(
        &mut self,
        table: &str,
        partition: &str,
        expression: &str,
        mode: &str,
    ) -> FixResult<()>;
    fn add_data_column(&mut self, table: &str, spec: &ColumnSpec) -> FixResult<()>;
    fn add_calculated_table_column(&mut self, table: &str, spec: &ColumnSpec) -> FixResult<()>;
    fn mark_as_date_table(&mut self, table: &str, column: &str) -> FixResult<()>;
    fn set_sort_by_column(&mut self, table: &str, column: &str, sort_by: &str) -> FixResult<()>;
    fn add_hierarchy(
        &mut self,
        table: &str,
        name: &str,
        columns: &[&str],
        display_folder: Option<&str>,
    ) -> FixResult<()>;
    fn add_measure(
        &mut self,
        table: &str,
        name: &str,
        expression: &str,
        display_folder: Option<&str>,
    ) -> FixResult<()>;
    fn add_calculation_group(&mut self, name: &str, precedence: i64) -> FixResult<()>;
    fn rename_column(&mut self, table: &str, from: &str, to: &str) -> FixResult<()>;
    fn add_calculation_item(
        &mut self,
        table: &str,
        name: &str,
        expression: &str,
        ordinal: usize,
    ) -> FixResult<()>;
    fn set_columns_hidden(&mut self, table: &str, hidden: bool) -> FixResult<()>;

    fn save_changes(&mut self) -> FixResult<()>;
}

struct Backing {
    store: Box<dyn DefinitionStore>,
    parts: Vec<DefinitionPart>,
    part_path: String,
}

pub struct BimModel {
    name: String,
    doc: BimDocument,
    readonly: bool,
    dirty: bool,
    unsaved_columns: HashSet<(String, String)>,
    committed: Vec<DefinitionPart>,
    backing: Option<Backing>,
}

fn is_model_part(path: &str) -> bool {
    path == MODEL_DEFINITION_FILE || path.ends_with(&format!("/{MODEL_DEFINITION_FILE}"))
}

impl BimModel {
    pub fn open(store: Box<dyn DefinitionStore>, readonly: bool) -> FixResult<Self> {
        let parts = store.load()?;
        let name = store.label();
        let part = parts.iter().find(|p| is_model_part(&p.path)).ok_or_else(|| {
            if parts.iter().any(|p| p.path.ends_with(".tmdl")) {
                FixError::Precondition(format!(
                    "model '{name}' is stored as TMDL; only model.bim definitions are supported"
                ))
            } else {
                FixError::NotFound(format!("{MODEL_DEFINITION_FILE} in model '{name}'"))
            }
        })?;
        let part_path = part.path.clone();
        let doc: BimDocument = serde_json::from_slice(&part.bytes)
            .map_err(|e| FixError::malformed(&part_path, e.to_string()))?;
        tracing::debug!(model = %name, tables = doc.model.tables.len(), readonly, "opened model");
        Ok(Self {
            name,
            doc,
            readonly,
            dirty: false,
            unsaved_columns: HashSet::new(),
            committed: vec![],
            backing: Some(Backing {
                store,
                parts,
                part_path,
            }),
        })
    }

    /// Detached model without a store; `save_changes` only settles column identities.
    #[cfg(test)]
    pub fn from_document(name: &str, doc: Value, readonly: bool) -> FixResult<Self> {
        let doc: BimDocument = serde_json::from_value(doc)
            .map_err(|e| FixError::malformed(MODEL_DEFINITION_FILE, e.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            doc,
            readonly,
            dirty: false,
            unsaved_columns: HashSet::new(),
            committed: vec![],
            backing: None,
        })
    }

    pub fn document(&self) -> FixResult<Value> {
        Ok(serde_json::to_value(&self.doc)?)
    }

    /// Saves pending edits, if any.
    pub fn flush(&mut self) -> FixResult<()> {
        if self.dirty && !self.readonly {
            self.save_changes()?;
        }
        Ok(())
    }

    /// Parts written to the store so far by this session.
    pub fn committed(&self) -> &[DefinitionPart] {
        &self.committed
    }

    /// Persists any pending edits and returns every part written by this session.
    #[cfg(test)]
    pub fn close(mut self) -> FixResult<Vec<DefinitionPart>> {
        self.flush()?;
        Ok(self.committed)
    }

    fn ensure_writable(&self, action: &str) -> FixResult<()> {
        if self.readonly {
            return Err(FixError::ReadOnly(action.to_string()));
        }
        Ok(())
    }

    fn find_table(&self, name: &str) -> Option<&BimTable> {
        self.doc.model.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> FixResult<&mut BimTable> {
        let model = self.name.clone();
        self.doc
            .model
            .tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| FixError::NotFound(format!("table '{name}' in model '{model}'")))
    }

    fn insert_table(&mut self, table: BimTable) -> FixResult<()> {
        if self
            .doc
            .model
            .tables
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&table.name))
        {
            return Err(FixError::Precondition(format!(
                "table '{}' already exists",
                table.name
            )));
        }
        tracing::info!(model = %self.name, table = %table.name, "added table");
        self.doc.model.tables.push(table);
        self.dirty = true;
        Ok(())
    }

    fn insert_column(&mut self, table: &str, column: BimColumn) -> FixResult<()> {
        let t = self.table_mut(table)?;
        if t.columns.iter().any(|c| c.name == column.name) {
            return Err(FixError::Precondition(format!(
                "column '{}' already exists in '{table}'",
                column.name
            )));
        }
        let key = (table.to_string(), column.name.clone());
        t.columns.push(column);
        self.unsaved_columns.insert(key);
        self.dirty = true;
        Ok(())
    }

    fn require_saved_column(&self, table: &str, column: &str) -> FixResult<()> {
        let exists = self
            .find_table(table)
            .map(|t| t.columns.iter().any(|c| c.name == column))
            .unwrap_or(false);
        if !exists {
            return Err(FixError::NotFound(format!("column '{table}'[{column}]")));
        }
        if self
            .unsaved_columns
            .contains(&(table.to_string(), column.to_string()))
        {
            return Err(FixError::Precondition(format!(
                "column '{table}'[{column}] must be saved before it can be referenced"
            )));
        }
        Ok(())
    }
}

fn column_from_spec(spec: &ColumnSpec, kind: Option<&str>) -> BimColumn {
    BimColumn {
        name: spec.name.to_string(),
        kind: kind.map(str::to_string),
        data_type: Some(spec.data_type.to_string()),
        source_column: Some(spec.source_column.to_string()),
        format_string: spec.format_string.map(str::to_string),
        is_key: spec.is_key,
        is_hidden: spec.hidden,
        summarize_by: Some(spec.summarize_by.to_string()),
        display_folder: spec.display_folder.map(str::to_string),
        ..BimColumn::default()
    }
}

impl SemanticModel for BimModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> Vec<TableInfo> {
        self.doc
            .model
            .tables
            .iter()
            .map(|t| TableInfo {
                name: t.name.clone(),
                data_category: t.data_category.clone(),
                precedence: t.calculation_group.as_ref().map(|g| g.precedence),
                columns: t
                    .columns
                    .iter()
                    .map(|c| ColumnInfo {
                        name: c.name.clone(),
                        is_key: c.is_key,
                        is_hidden: c.is_hidden,
                    })
                    .collect(),
            })
            .collect()
    }

    fn discourage_implicit_measures(&self) -> bool {
        self.doc.model.discourage_implicit_measures.unwrap_or(false)
    }

    fn set_discourage_implicit_measures(&mut self, value: bool) -> FixResult<()> {
        self.ensure_writable("set discourageImplicitMeasures")?;
        self.doc.model.discourage_implicit_measures = Some(value);
        self.dirty = true;
        Ok(())
    }

    fn add_table(&mut self, name: &str, hidden: bool) -> FixResult<()> {
        self.ensure_writable("add a table")?;
        self.insert_table(BimTable {
            name: name.to_string(),
            is_hidden: hidden,
            ..BimTable::default()
        })
    }

    fn add_calculated_table(
        &mut self,
        name: &str,
        expression: &str,
        data_category: Option<&str>,
    ) -> FixResult<()> {
        self.ensure_writable("add a calculated table")?;
        self.insert_table(BimTable {
            name: name.to_string(),
            data_category: data_category.map(str::to_string),
            partitions: vec![json!({
                "name": name,
                "mode": "import",
                "source": { "type": "calculated", "expression": expression }
            })],
            ..BimTable::default()
        })
    }

    fn add_m_partition(
        &mut self,
        table: &str,
        partition: &str,
        expression: &str,
        mode: &str,
    ) -> FixResult<()> {
        self.ensure_writable("add a partition")?;
        let t = self.table_mut(table)?;
        t.partitions.push(json!({
            "name": partition,
            "mode": mode.to_ascii_lowercase(),
            "source": { "type": "m", "expression": expression }
        }));
        self.dirty = true;
        Ok(())
    }

    fn add_data_column(&mut self, table: &str, spec: &ColumnSpec) -> FixResult<()> {
        self.ensure_writable("add a column")?;
        self.insert_column(table, column_from_spec(spec, None))
    }

    fn add_calculated_table_column(&mut self, table: &str, spec: &ColumnSpec) -> FixResult<()> {
        self.ensure_writable("add a column")?;
        self.insert_column(table, column_from_spec(spec, Some("calculatedTableColumn")))
    }

    fn mark_as_date_table(&mut self, table: &str, column: &str) -> FixResult<()> {
        self.ensure_writable("mark a date table")?;
        let t = self.table_mut(table)?;
        if !t.columns.iter().any(|c| c.name == column) {
            return Err(FixError::NotFound(format!("column '{table}'[{column}]")));
        }
        t.data_category = Some("Time".to_string());
        for c in t.columns.iter_mut() {
            c.is_key = c.name == column;
        }
        self.dirty = true;
        Ok(())
    }

    fn set_sort_by_column(&mut self, table: &str, column: &str, sort_by: &str) -> FixResult<()> {
        self.ensure_writable("set a sort-by column")?;
        self.require_saved_column(table, column)?;
        self.require_saved_column(table, sort_by)?;
        let t = self.table_mut(table)?;
        if let Some(c) = t.columns.iter_mut().find(|c| c.name == column) {
            c.sort_by_column = Some(sort_by.to_string());
        }
        self.dirty = true;
        Ok(())
    }

    fn add_hierarchy(
        &mut self,
        table: &str,
        name: &str,
        columns: &[&str],
        display_folder: Option<&str>,
    ) -> FixResult<()> {
        self.ensure_writable("add a hierarchy")?;
        for column in columns {
            self.require_saved_column(table, column)?;
        }
        let levels: Vec<Value> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| json!({ "name": c, "ordinal": i, "column": c }))
            .collect();
        let mut hierarchy = json!({ "name": name, "levels": levels });
        if let Some(folder) = display_folder {
            hierarchy["displayFolder"] = json!(folder);
        }
        let t = self.table_mut(table)?;
        t.hierarchies.push(hierarchy);
        self.dirty = true;
        Ok(())
    }

    fn add_measure(
        &mut self,
        table: &str,
        name: &str,
        expression: &str,
        display_folder: Option<&str>,
    ) -> FixResult<()> {
        self.ensure_writable("add a measure")?;
        let mut measure = json!({ "name": name, "expression": expression });
        if let Some(folder) = display_folder {
            measure["displayFolder"] = json!(folder);
        }
        let t = self.table_mut(table)?;
        t.measures.push(measure);
        self.dirty = true;
        Ok(())
    }

    fn add_calculation_group(&mut self, name: &str, precedence: i64) -> FixResult<()> {
        self.ensure_writable("add a calculation group")?;
        self.insert_table(BimTable {
            name: name.to_string(),
            calculation_group: Some(BimCalculationGroup {
                precedence,
                ..BimCalculationGroup::default()
            }),
            partitions: vec![json!({
                "name": name,
                "mode": "import",
                "source": { "type": "calculationGroup" }
            })],
            ..BimTable::default()
        })?;
        self.insert_column(
            name,
            BimColumn {
                name: "Name".to_string(),
                data_type: Some("string".to_string()),
                source_column: Some("Name".to_string()),
                sort_by_column: Some("Ordinal".to_string()),
                ..BimColumn::default()
            },
        )?;
        self.insert_column(
            name,
            BimColumn {
                name: "Ordinal".to_string(),
                data_type: Some("int64".to_string()),
                source_column: Some("Ordinal".to_string()),
                is_hidden: true,
                ..BimColumn::default()
            },
        )?;
        self.doc.model.discourage_implicit_measures = Some(true);
        Ok(())
    }

    fn rename_column(&mut self, table: &str, from: &str, to: &str) -> FixResult<()> {
        self.ensure_writable("rename a column")?;
        let t = self.table_mut(table)?;
        if t.columns.iter().any(|c| c.name == to) {
            return Err(FixError::Precondition(format!(
                "column '{table}'[{to}] already exists"
            )));
        }
        let column = t
            .columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| FixError::NotFound(format!("column '{table}'[{from}]")))?;
        column.name = to.to_string();
        for c in t.columns.iter_mut() {
            if c.sort_by_column.as_deref() == Some(from) {
                c.sort_by_column = Some(to.to_string());
            }
        }
        for level in t
            .hierarchies
            .iter_mut()
            .filter_map(|h| h.get_mut("levels").and_then(Value::as_array_mut))
            .flatten()
        {
            if level.get("column").and_then(Value::as_str) == Some(from) {
                level["column"] = json!(to);
            }
        }
        let key = (table.to_string(), from.to_string());
        if self.unsaved_columns.remove(&key) {
            self.unsaved_columns
                .insert((table.to_string(), to.to_string()));
        }
        self.dirty = true;
        Ok(())
    }

    fn add_calculation_item(
        &mut self,
        table: &str,
        name: &str,
        expression: &str,
        ordinal: usize,
    ) -> FixResult<()> {
        self.ensure_writable("add a calculation item")?;
        let t = self.table_mut(table)?;
        let group = t.calculation_group.as_mut().ok_or_else(|| {
            FixError::Precondition(format!("table '{table}' is not a calculation group"))
        })?;
        group.calculation_items.push(json!({
            "name": name,
            "expression": expression,
            "ordinal": ordinal
        }));
        self.dirty = true;
        Ok(())
    }

    fn set_columns_hidden(&mut self, table: &str, hidden: bool) -> FixResult<()> {
        self.ensure_writable("hide columns")?;
        let t = self.table_mut(table)?;
        for c in t.columns.iter_mut() {
            c.is_hidden = hidden;
        }
        self.dirty = true;
        Ok(())
    }

    fn save_changes(&mut self) -> FixResult<()> {
        self.ensure_writable("save changes")?;
        self.unsaved_columns.clear();
        if !self.dirty {
            return Ok(());
        }
        if let Some(backing) = self.backing.as_mut() {
            let bytes = serde_json::to_vec_pretty(&self.doc)?;
            let mut changed = None;
            if let Some(part) = backing
                .parts
                .iter_mut()
                .find(|p| p.path == backing.part_path)
            {
                part.bytes = bytes;
                changed = Some(part.clone());
            }
            backing
                .store
                .store(&backing.parts, std::slice::from_ref(&backing.part_path))?;
            if let Some(part) = changed {
                self.committed.retain(|p| p.path != part.path);
                self.committed.push(part);
            }
        }
        tracing::info!(model = %self.name, "saved model changes");
        self.dirty = false;
        Ok(())
    }
}

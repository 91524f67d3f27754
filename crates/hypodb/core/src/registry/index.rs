// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Hypothetical index definitions

use hypodb_common::{AccessMethod, AttrNumber, DataType, Datum, Oid, RelationMeta};
use serde::{Deserialize, Serialize};

use super::sizing::{self, IndexSize};
use super::{RegistryError, RegistryResult};
use crate::host::{CmpOp, ColumnTest, Qual, Restriction, restriction_selectivity};

/// Longest identifier the catalog accepts, in bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexKey {
    Column(String),
    /// An opaque expression. It is sized like a text column and never matches a restriction.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexKeySpec {
    pub key: IndexKey,
    pub descending: bool,
    /// Defaults to NULLS FIRST for descending keys and NULLS LAST otherwise
    pub nulls_first: Option<bool>,
}

impl IndexKeySpec {
    fn column(name: &str) -> Self {
        Self {
            key: IndexKey::Column(name.to_string()),
            descending: false,
            nulls_first: None,
        }
    }
}

/// What to index, as a CREATE INDEX statement would describe it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub access_method: AccessMethod,
    pub keys: Vec<IndexKeySpec>,
    pub include: Vec<String>,
    pub unique: bool,
    pub predicate: Vec<Qual>,
}

impl IndexSpec {
    pub fn new(access_method: AccessMethod, columns: &[&str]) -> Self {
        Self {
            access_method,
            keys: columns.iter().map(|c| IndexKeySpec::column(c)).collect(),
            include: Vec::new(),
            unique: false,
            predicate: Vec::new(),
        }
    }

    pub fn btree(columns: &[&str]) -> Self {
        Self::new(AccessMethod::BTree, columns)
    }

    pub fn hash(column: &str) -> Self {
        Self::new(AccessMethod::Hash, &[column])
    }

    pub fn brin(columns: &[&str]) -> Self {
        Self::new(AccessMethod::Brin, columns)
    }

    pub fn using(mut self, access_method: AccessMethod) -> Self {
        self.access_method = access_method;
        self
    }

    /// Appends an expression key
    pub fn expression(mut self, expression: &str) -> Self {
        self.keys.push(IndexKeySpec {
            key: IndexKey::Expression(expression.to_string()),
            descending: false,
            nulls_first: None,
        });
        self
    }

    /// Marks a key column DESC
    pub fn desc(mut self, column: &str) -> Self {
        if let Some(key) = self.key_mut(column) {
            key.descending = true;
        }
        self
    }

    pub fn nulls_first(mut self, column: &str, first: bool) -> Self {
        if let Some(key) = self.key_mut(column) {
            key.nulls_first = Some(first);
        }
        self
    }

    pub fn include(mut self, columns: &[&str]) -> Self {
        self.include.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a conjunct to the partial index predicate
    pub fn filter(mut self, column: &str, op: CmpOp, value: impl Into<Datum>) -> Self {
        self.predicate.push(Qual::new(column, ColumnTest::Cmp(op, value.into())));
        self
    }

    pub fn filter_not_null(mut self, column: &str) -> Self {
        self.predicate.push(Qual::new(column, ColumnTest::IsNotNull));
        self
    }

    fn key_mut(&mut self, column: &str) -> Option<&mut IndexKeySpec> {
        self.keys.iter_mut().find(|k| matches!(&k.key, IndexKey::Column(name) if name.eq_ignore_ascii_case(column)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypotheticalIndexColumn {
    /// `None` for an expression key
    pub attnum: Option<AttrNumber>,
    /// Column name or expression text
    pub label: String,
    pub data_type: DataType,
    pub descending: bool,
    pub nulls_first: bool,
}

/// A registered hypothetical index. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypotheticalIndex {
    pub oid: Oid,
    pub relid: Oid,
    pub relation_name: String,
    pub name: String,
    pub access_method: AccessMethod,
    pub columns: Vec<HypotheticalIndexColumn>,
    pub include: Vec<(AttrNumber, String)>,
    pub unique: bool,
    pub predicate: Vec<Restriction>,
    pub size: IndexSize,
}

impl HypotheticalIndex {
    /// Validates `spec` against the relation and computes the size estimate.
    ///
    /// The identifier is only assigned here; nothing is registered.
    pub fn build(oid: Oid, relation: &RelationMeta, spec: &IndexSpec) -> RegistryResult<Self> {
        validate(relation, spec)?;

        let column_not_found = |column: &str| RegistryError::ColumnNotFound {
            relation: relation.name.clone(),
            column: column.to_string(),
        };

        let mut columns = Vec::with_capacity(spec.keys.len());
        for key in &spec.keys {
            let (attnum, label, data_type) = match &key.key {
                IndexKey::Column(name) => {
                    let def = relation.column_by_name(name).ok_or_else(|| column_not_found(name))?;
                    (Some(def.attnum), def.name.clone(), def.data_type)
                }
                IndexKey::Expression(text) => (None, text.clone(), DataType::Text),
            };
            columns.push(HypotheticalIndexColumn {
                attnum,
                label,
                data_type,
                descending: key.descending,
                nulls_first: key.nulls_first.unwrap_or(key.descending),
            });
        }

        let mut include = Vec::with_capacity(spec.include.len());
        let mut include_types = Vec::with_capacity(spec.include.len());
        for name in &spec.include {
            let def = relation.column_by_name(name).ok_or_else(|| column_not_found(name))?;
            include.push((def.attnum, def.name.clone()));
            include_types.push(def.data_type);
        }

        let mut predicate = Vec::with_capacity(spec.predicate.len());
        for qual in &spec.predicate {
            predicate.push(qual.resolve(relation).ok_or_else(|| column_not_found(&qual.column))?);
        }

        let selectivity = restriction_selectivity(&predicate, &relation.columns);
        let sized_types: Vec<DataType> = columns.iter().map(|c| c.data_type).chain(include_types).collect();
        let size = sizing::estimate(spec.access_method, &sized_types, relation.pages, relation.tuples * selectivity);

        let labels: Vec<&str> = columns.iter().map(|c| c.label.as_str()).collect();
        Ok(Self {
            oid,
            relid: relation.oid,
            relation_name: relation.name.clone(),
            name: display_name(oid, spec.access_method, &relation.name, &labels),
            access_method: spec.access_method,
            columns,
            include,
            unique: spec.unique,
            predicate,
            size,
        })
    }

    pub fn is_partial(&self) -> bool {
        !self.predicate.is_empty()
    }

    pub fn estimated_bytes(&self) -> u64 {
        self.size.bytes()
    }

    /// The CREATE INDEX statement that would build this index
    pub fn definition(&self) -> String {
        let keys: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut key = match c.attnum {
                    Some(_) => c.label.clone(),
                    None => format!("({})", c.label),
                };
                if c.descending {
                    key.push_str(" DESC");
                }
                if c.nulls_first != c.descending {
                    key.push_str(if c.nulls_first { " NULLS FIRST" } else { " NULLS LAST" });
                }
                key
            })
            .collect();

        let mut sql = format!(
            "CREATE {}INDEX ON {} USING {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.relation_name,
            self.access_method,
            keys.join(", ")
        );
        if !self.include.is_empty() {
            let names: Vec<&str> = self.include.iter().map(|(_, name)| name.as_str()).collect();
            sql.push_str(&format!(" INCLUDE ({})", names.join(", ")));
        }
        if !self.predicate.is_empty() {
            let clauses: Vec<String> = self.predicate.iter().map(|r| r.to_string()).collect();
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }
        sql
    }
}

fn validate(relation: &RelationMeta, spec: &IndexSpec) -> RegistryResult<()> {
    let am = spec.access_method;
    let unsupported = |reason: String| Err(RegistryError::UnsupportedIndex(reason));

    if !relation.kind.is_indexable() {
        return unsupported(format!("\"{}\" is not a table or materialized view", relation.name));
    }
    if spec.keys.is_empty() {
        return unsupported("an index needs at least one key column".to_string());
    }
    if spec.keys.len() > 1 && !am.can_multi_column() {
        return unsupported(format!("access method \"{am}\" does not support multicolumn indexes"));
    }
    if spec.unique && !am.can_unique() {
        return unsupported(format!("access method \"{am}\" does not support unique indexes"));
    }
    if !spec.include.is_empty() && !am.can_include() {
        return unsupported(format!("access method \"{am}\" does not support included columns"));
    }
    if !am.can_order() && spec.keys.iter().any(|k| k.descending || k.nulls_first.is_some()) {
        return unsupported(format!("access method \"{am}\" does not support ASC/DESC options"));
    }
    Ok(())
}

/// `<oid><am>_<table>_<col>[_<col>...]`, cut to the identifier length limit
pub fn display_name(oid: Oid, access_method: AccessMethod, relation: &str, columns: &[&str]) -> String {
    let mut name = format!("<{oid}>{access_method}_{relation}");
    for column in columns {
        name.push('_');
        name.push_str(column);
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        let mut cut = MAX_IDENTIFIER_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

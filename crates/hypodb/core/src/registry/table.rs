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

//! Hypothetical partitioning layouts

use hypodb_common::{DataType, Datum, Oid, RelationMeta};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use super::{RegistryError, RegistryResult};
use crate::host::{PartitionBound, PartitionKey, PartitionStrategy, RangeDatum, compare_range_bounds};

/// How to partition a table, or one partition of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitioningSpec {
    pub strategy: PartitionStrategy,
    pub key: Vec<String>,
    pub partitions: Vec<PartitionSpec>,
}

impl PartitioningSpec {
    pub fn new(strategy: PartitionStrategy, key: &[&str]) -> Self {
        Self {
            strategy,
            key: key.iter().map(|k| k.to_string()).collect(),
            partitions: Vec::new(),
        }
    }

    pub fn range(key: &[&str]) -> Self {
        Self::new(PartitionStrategy::Range, key)
    }

    pub fn list(column: &str) -> Self {
        Self::new(PartitionStrategy::List, &[column])
    }

    pub fn hash(key: &[&str]) -> Self {
        Self::new(PartitionStrategy::Hash, key)
    }

    pub fn partition(mut self, partition: PartitionSpec) -> Self {
        self.partitions.push(partition);
        self
    }

    /// Adds `modulus` hash partitions named `<prefix>_<remainder>`
    pub fn hash_partitions(mut self, prefix: &str, modulus: u32) -> Self {
        for remainder in 0..modulus {
            self.partitions.push(PartitionSpec::hash(&format!("{prefix}_{remainder}"), modulus, remainder));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub name: String,
    pub bound: PartitionBound,
    pub subpartitioning: Option<PartitioningSpec>,
}

impl PartitionSpec {
    pub fn new(name: &str, bound: PartitionBound) -> Self {
        Self {
            name: name.to_string(),
            bound,
            subpartitioning: None,
        }
    }

    /// Single-column range partition `FROM (lower) TO (upper)`
    pub fn range(name: &str, lower: RangeDatum, upper: RangeDatum) -> Self {
        Self::new(name, PartitionBound::Range { lower: vec![lower], upper: vec![upper] })
    }

    pub fn list(name: &str, values: Vec<Datum>) -> Self {
        Self::new(name, PartitionBound::List(values))
    }

    pub fn hash(name: &str, modulus: u32, remainder: u32) -> Self {
        Self::new(name, PartitionBound::Hash { modulus, remainder })
    }

    pub fn default(name: &str) -> Self {
        Self::new(name, PartitionBound::Default)
    }

    pub fn subpartition_by(mut self, spec: PartitioningSpec) -> Self {
        self.subpartitioning = Some(spec);
        self
    }
}

/// A node of a hypothetical partition tree: the root shadowing a real table, or a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypotheticalTable {
    pub oid: Oid,
    /// The real table whose heap every node of the tree scans
    pub relid: Oid,
    pub name: String,
    pub parent: Option<Oid>,
    /// `None` for the root
    pub bound: Option<PartitionBound>,
    /// Set when this node is itself partitioned
    pub key: Option<Arc<PartitionKey>>,
    /// Partitions in bound order, the default partition last
    pub children: Vec<Oid>,
    /// Estimated fraction of the real table's rows that belong here
    pub share: f64,
    pub level: usize,
}

impl HypotheticalTable {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_partitioned(&self) -> bool {
        self.key.is_some()
    }
}

fn datum_fits(datum: &Datum, data_type: DataType) -> bool {
    matches!(
        (datum, data_type),
        (Datum::Null, _)
            | (Datum::Bool(_), DataType::Bool)
            | (Datum::Int(_), DataType::Int4 | DataType::Int8 | DataType::Float8)
            | (Datum::Float(_), DataType::Float8)
            | (Datum::Text(_), DataType::Text)
    )
}

/// Resolves the key columns of `spec` against the shadowed relation
pub fn resolve_key(relation: &RelationMeta, spec: &PartitioningSpec) -> RegistryResult<PartitionKey> {
    let invalid = |reason: String| RegistryError::InvalidPartitionSpec(reason);
    if spec.key.is_empty() {
        return Err(invalid("a partition key needs at least one column".to_string()));
    }
    if spec.strategy == PartitionStrategy::List && spec.key.len() != 1 {
        return Err(invalid("cannot use list partition strategy with more than one column".to_string()));
    }

    let mut key = PartitionKey {
        strategy: spec.strategy,
        attnums: Vec::with_capacity(spec.key.len()),
        types: Vec::with_capacity(spec.key.len()),
        names: Vec::with_capacity(spec.key.len()),
    };
    for name in &spec.key {
        let column = relation.column_by_name(name).ok_or_else(|| RegistryError::ColumnNotFound {
            relation: relation.name.clone(),
            column: name.clone(),
        })?;
        if key.attnums.contains(&column.attnum) {
            return Err(invalid(format!("column \"{}\" appears more than once in partition key", column.name)));
        }
        key.attnums.push(column.attnum);
        key.types.push(column.data_type);
        key.names.push(column.name.clone());
    }
    Ok(key)
}

/// Checks a partitioning layout, recursively, before any identifier is allocated
pub fn validate(relation: &RelationMeta, spec: &PartitioningSpec) -> RegistryResult<()> {
    let mut names = HashSet::new();
    names.insert(relation.name.to_ascii_lowercase());
    validate_level(relation, spec, &mut names)
}

fn validate_level(relation: &RelationMeta, spec: &PartitioningSpec, names: &mut HashSet<String>) -> RegistryResult<()> {
    let invalid = |reason: String| Err(RegistryError::InvalidPartitionSpec(reason));
    let key = resolve_key(relation, spec)?;

    if spec.partitions.is_empty() {
        return invalid(format!("{} partitioning needs at least one partition", spec.strategy));
    }

    let mut defaults = 0;
    for partition in &spec.partitions {
        if !names.insert(partition.name.to_ascii_lowercase()) {
            return invalid(format!("partition name \"{}\" is used more than once", partition.name));
        }
        match &partition.bound {
            PartitionBound::Default => {
                if spec.strategy == PartitionStrategy::Hash {
                    return invalid("a hash-partitioned table may not have a default partition".to_string());
                }
                defaults += 1;
                if defaults > 1 {
                    return invalid(format!("partition \"{}\" would be a second default partition", partition.name));
                }
            }
            bound if bound.strategy() != Some(spec.strategy) => {
                return invalid(format!("partition \"{}\" has a bound that does not match {} partitioning", partition.name, spec.strategy));
            }
            bound => validate_bound(&partition.name, bound, &key)?,
        }
    }

    match spec.strategy {
        PartitionStrategy::Range => check_range_overlaps(spec)?,
        PartitionStrategy::List => check_list_overlaps(spec)?,
        PartitionStrategy::Hash => check_hash_overlaps(spec)?,
    }

    for partition in &spec.partitions {
        if let Some(sub) = &partition.subpartitioning {
            validate_level(relation, sub, names)?;
        }
    }
    Ok(())
}

fn validate_bound(name: &str, bound: &PartitionBound, key: &PartitionKey) -> RegistryResult<()> {
    let invalid = |reason: String| Err(RegistryError::InvalidPartitionSpec(reason));
    match bound {
        PartitionBound::Range { lower, upper } => {
            if lower.len() != key.arity() || upper.len() != key.arity() {
                return invalid(format!("partition \"{name}\" bound must have exactly {} values", key.arity()));
            }
            for (datum, data_type) in lower.iter().chain(upper.iter()).zip(key.types.iter().cycle()) {
                if let RangeDatum::Value(value) = datum
                    && (value.is_null() || !datum_fits(value, *data_type))
                {
                    return invalid(format!("partition \"{name}\" bound value {value} is not valid for type {}", data_type.sql_name()));
                }
            }
            for (which, values) in [("lower", lower), ("upper", upper)] {
                if let Some(position) = values.iter().position(|d| !matches!(d, RangeDatum::Value(_)))
                    && values[position + 1..].iter().any(|d| d != &values[position])
                {
                    return invalid(format!("every {which} bound value of partition \"{name}\" following {} must also be {}", values[position], values[position]));
                }
            }
            if compare_range_bounds(lower, upper) != Some(Ordering::Less) {
                return invalid(format!("empty range bound specified for partition \"{name}\""));
            }
        }
        PartitionBound::List(values) => {
            if values.is_empty() {
                return invalid(format!("partition \"{name}\" must list at least one value"));
            }
            if let Some(value) = values.iter().find(|v| !datum_fits(v, key.types[0])) {
                return invalid(format!("partition \"{name}\" value {value} is not valid for type {}", key.types[0].sql_name()));
            }
        }
        PartitionBound::Hash { modulus, remainder } => {
            if *modulus == 0 {
                return invalid(format!("partition \"{name}\" modulus must be a positive integer"));
            }
            if remainder >= modulus {
                return invalid(format!("partition \"{name}\" remainder must be less than modulus"));
            }
        }
        PartitionBound::Default => {}
    }
    Ok(())
}

fn check_range_overlaps(spec: &PartitioningSpec) -> RegistryResult<()> {
    let mut ranges: Vec<(&str, &[RangeDatum], &[RangeDatum])> = spec
        .partitions
        .iter()
        .filter_map(|p| match &p.bound {
            PartitionBound::Range { lower, upper } => Some((p.name.as_str(), lower.as_slice(), upper.as_slice())),
            _ => None,
        })
        .collect();
    ranges.sort_by(|a, b| compare_range_bounds(a.1, b.1).unwrap_or(Ordering::Equal));
    for pair in ranges.windows(2) {
        let (_, _, upper) = pair[0];
        let (name, lower, _) = pair[1];
        if compare_range_bounds(upper, lower) == Some(Ordering::Greater) {
            return Err(RegistryError::InvalidPartitionSpec(format!("partition \"{name}\" would overlap partition \"{}\"", pair[0].0)));
        }
    }
    Ok(())
}

fn check_list_overlaps(spec: &PartitioningSpec) -> RegistryResult<()> {
    let mut seen: Vec<(&str, &Datum)> = Vec::new();
    for partition in &spec.partitions {
        let PartitionBound::List(values) = &partition.bound else {
            continue;
        };
        for value in values {
            let clash = seen
                .iter()
                .find(|(_, other)| (value.is_null() && other.is_null()) || value.compare(other) == Some(Ordering::Equal));
            if let Some((owner, _)) = clash {
                return Err(RegistryError::InvalidPartitionSpec(format!(
                    "partition \"{}\" would overlap partition \"{owner}\" on value {value}",
                    partition.name
                )));
            }
            seen.push((partition.name.as_str(), value));
        }
    }
    Ok(())
}

fn check_hash_overlaps(spec: &PartitioningSpec) -> RegistryResult<()> {
    let bounds: Vec<(&str, u32, u32)> = spec
        .partitions
        .iter()
        .filter_map(|p| match p.bound {
            PartitionBound::Hash { modulus, remainder } => Some((p.name.as_str(), modulus, remainder)),
            _ => None,
        })
        .collect();
    for (i, (name, modulus, remainder)) in bounds.iter().enumerate() {
        for (other, other_modulus, other_remainder) in &bounds[..i] {
            let (small, large) = if modulus <= other_modulus { ((modulus, remainder), (other_modulus, other_remainder)) } else { ((other_modulus, other_remainder), (modulus, remainder)) };
            if *large.0 % *small.0 != 0 {
                return Err(RegistryError::InvalidPartitionSpec(format!(
                    "every hash partition modulus must be a factor of the next larger modulus (\"{name}\" and \"{other}\")"
                )));
            }
            if *large.1 % *small.0 == *small.1 {
                return Err(RegistryError::InvalidPartitionSpec(format!("partition \"{name}\" would overlap partition \"{other}\"")));
            }
        }
    }
    Ok(())
}

/// Orders partitions the way a partition descriptor lists them: by bound, default last
pub fn bound_order(a: &PartitionBound, b: &PartitionBound) -> Ordering {
    match (a, b) {
        (PartitionBound::Default, PartitionBound::Default) => Ordering::Equal,
        (PartitionBound::Default, _) => Ordering::Greater,
        (_, PartitionBound::Default) => Ordering::Less,
        (PartitionBound::Range { lower: a, .. }, PartitionBound::Range { lower: b, .. }) => compare_range_bounds(a, b).unwrap_or(Ordering::Equal),
        (PartitionBound::List(a), PartitionBound::List(b)) => {
            let smallest = |values: &[Datum]| values.iter().filter(|v| !v.is_null()).cloned().reduce(|x, y| if y.compare(&x) == Some(Ordering::Less) { y } else { x });
            match (smallest(a.as_slice()), smallest(b.as_slice())) {
                (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        (PartitionBound::Hash { modulus: m1, remainder: r1 }, PartitionBound::Hash { modulus: m2, remainder: r2 }) => (m1, r1).cmp(&(m2, r2)),
        _ => Ordering::Equal,
    }
}

/// Fraction of the parent's rows a partition is expected to hold
fn local_share(bound: &PartitionBound, siblings: usize) -> f64 {
    match bound {
        PartitionBound::Hash { modulus, .. } => 1.0 / f64::from((*modulus).max(1)),
        _ => 1.0 / siblings.max(1) as f64,
    }
}

/// Builds the node list for a validated layout, root first, drawing identifiers from `allocate`.
///
/// Identifiers drawn before a failure are reported through `allocated` so the caller can return them.
pub fn build_tree(
    relation: &RelationMeta,
    spec: &PartitioningSpec,
    allocated: &mut Vec<Oid>,
    allocate: &mut dyn FnMut() -> RegistryResult<Oid>,
) -> RegistryResult<Vec<HypotheticalTable>> {
    let root_oid = allocate()?;
    allocated.push(root_oid);
    let root = HypotheticalTable {
        oid: root_oid,
        relid: relation.oid,
        name: relation.name.clone(),
        parent: None,
        bound: None,
        key: None,
        children: Vec::new(),
        share: 1.0,
        level: 0,
    };
    let mut nodes = vec![root];
    attach_level(relation, spec, 0, &mut nodes, allocated, allocate)?;
    Ok(nodes)
}

fn attach_level(
    relation: &RelationMeta,
    spec: &PartitioningSpec,
    parent_index: usize,
    nodes: &mut Vec<HypotheticalTable>,
    allocated: &mut Vec<Oid>,
    allocate: &mut dyn FnMut() -> RegistryResult<Oid>,
) -> RegistryResult<()> {
    nodes[parent_index].key = Some(Arc::new(resolve_key(relation, spec)?));
    let parent_oid = nodes[parent_index].oid;
    let parent_share = nodes[parent_index].share;
    let level = nodes[parent_index].level + 1;

    let mut ordered: Vec<&PartitionSpec> = spec.partitions.iter().collect();
    ordered.sort_by(|a, b| bound_order(&a.bound, &b.bound));

    let mut pending = Vec::new();
    for partition in ordered {
        let oid = allocate()?;
        allocated.push(oid);
        nodes[parent_index].children.push(oid);
        nodes.push(HypotheticalTable {
            oid,
            relid: relation.oid,
            name: partition.name.clone(),
            parent: Some(parent_oid),
            bound: Some(partition.bound.clone()),
            key: None,
            children: Vec::new(),
            share: parent_share * local_share(&partition.bound, spec.partitions.len()),
            level,
        });
        if let Some(sub) = &partition.subpartitioning {
            pending.push((nodes.len() - 1, sub));
        }
    }

    for (index, sub) in pending {
        attach_level(relation, sub, index, nodes, allocated, allocate)?;
    }
    Ok(())
}

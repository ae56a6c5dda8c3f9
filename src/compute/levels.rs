//! Dependency levels of same-table formula fields.
//!
//! Fields that only read stored columns sit at level 0; a formula that
//! reads another field of the same batch sits one level above it.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use tracing::debug;

use crate::error::{DomainError, DomainResult};
use crate::model::field::{Field, FieldId};
use crate::model::table::Table;

use super::batch::SameTableFieldLevel;

static FIELD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid field token regex"));

/// Field ids referenced by a formula expression, in first-seen order.
pub fn field_references(expression: &str) -> Vec<FieldId> {
    let mut seen = HashSet::new();
    FIELD_TOKEN
        .captures_iter(expression)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(FieldId::from)
        .collect()
}

fn dependencies(field: &Field) -> Vec<FieldId> {
    field
        .formula()
        .map(|f| field_references(&f.expression))
        .unwrap_or_default()
}

/// Group the requested fields into evaluation levels.
pub fn compute_field_levels(
    table: &Table,
    field_ids: &[FieldId],
) -> DomainResult<Vec<SameTableFieldLevel>> {
    let mut graph: DiGraph<FieldId, ()> = DiGraph::new();
    let mut nodes: HashMap<FieldId, NodeIndex> = HashMap::new();

    for id in field_ids {
        table.require_field(id)?;
        if !nodes.contains_key(id) {
            let idx = graph.add_node(id.clone());
            nodes.insert(id.clone(), idx);
        }
    }

    // Edge dependency -> dependent, only within the batch.
    for (id, &idx) in &nodes {
        let field = table.require_field(id)?;
        for dep in dependencies(field) {
            if let Some(&dep_idx) = nodes.get(&dep) {
                graph.add_edge(dep_idx, idx, ());
            }
        }
    }

    let order = match toposort(&graph, None) {
        Ok(order) => order,
        Err(_) => return Err(DomainError::CyclicDependency(find_cycle(&graph, table))),
    };

    let mut levels: HashMap<NodeIndex, usize> = HashMap::new();
    for idx in order {
        let level = graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|dep| levels.get(&dep))
            .map(|level| level + 1)
            .max()
            .unwrap_or(0);
        levels.insert(idx, level);
    }

    let mut grouped: Vec<SameTableFieldLevel> = Vec::new();
    for (idx, level) in levels {
        let id = graph[idx].clone();
        match grouped.iter_mut().find(|l| l.level == level) {
            Some(existing) => existing.field_ids.push(id),
            None => grouped.push(SameTableFieldLevel::new(level, vec![id])),
        }
    }
    grouped.sort_by_key(|l| l.level);
    for level in &mut grouped {
        level
            .field_ids
            .sort_by_key(|id| table.field_position(id).unwrap_or(usize::MAX));
    }

    debug!(table = %table.id, levels = grouped.len(), "field levels computed");
    Ok(grouped)
}

/// Fields of one cycle, in table order.
fn find_cycle(graph: &DiGraph<FieldId, ()>, table: &Table) -> Vec<FieldId> {
    let cycle = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .unwrap_or_default();
    let mut ids: Vec<FieldId> = cycle.into_iter().map(|idx| graph[idx].clone()).collect();
    ids.sort_by_key(|id| table.field_position(id).unwrap_or(usize::MAX));
    ids
}

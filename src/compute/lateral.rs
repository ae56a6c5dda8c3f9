//! Lateral join planning.
//!
//! Cross-table values (links, lookups, rollups) are produced by lateral
//! subqueries the surrounding query builder renders. Compilers only ask a
//! [`LateralJoinPlanner`] for an alias and reference `"<alias>"."<column>"`.

use std::fmt;
use tracing::trace;

use crate::model::field::{FieldId, FilterCondition, LinkOptions, TableId};
use crate::model::types::Relationship;

/// How linked records are ordered inside an aggregated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOrderBy {
    /// Order column lives on the foreign table.
    Foreign { order_column: Option<String> },
    /// Order column lives on the junction table.
    Junction {
        junction_table: String,
        self_key: String,
        foreign_key: String,
        order_column: Option<String>,
    },
}

/// What a lateral join must expose.
#[derive(Debug, Clone, PartialEq)]
pub enum LateralColumnType {
    Link {
        lookup_field_id: FieldId,
        is_multiple: bool,
        order_by: Option<LinkOrderBy>,
    },
    Lookup {
        foreign_field_id: FieldId,
        is_multiple: bool,
        order_by: Option<LinkOrderBy>,
        filter: Option<FilterCondition>,
    },
    Rollup {
        foreign_field_id: FieldId,
        expression: String,
        order_by: Option<LinkOrderBy>,
    },
    ConditionalLookup {
        foreign_field_id: FieldId,
        is_multiple: bool,
        filter: FilterCondition,
    },
    ConditionalRollup {
        foreign_field_id: FieldId,
        expression: String,
        filter: FilterCondition,
    },
}

impl LateralColumnType {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LateralColumnType::Link { .. } => "link",
            LateralColumnType::Lookup { .. } => "lookup",
            LateralColumnType::Rollup { .. } => "rollup",
            LateralColumnType::ConditionalLookup { .. } => "conditionalLookup",
            LateralColumnType::ConditionalRollup { .. } => "conditionalRollup",
        }
    }
}

/// Accepts lateral join requests and hands back the alias to reference.
///
/// Every returned alias is a valid identifier unique within the query.
/// Callers must not assume that two identical requests share an alias.
pub trait LateralJoinPlanner {
    /// Request a join keyed by a link field and its foreign table.
    fn add_column(
        &mut self,
        link_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String;

    /// Request a filter-driven join keyed by the host field itself.
    fn add_conditional_column(
        &mut self,
        host_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String;
}

/// Key of a recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKey {
    Link {
        link_field_id: FieldId,
        foreign_table_id: TableId,
    },
    Conditional {
        host_field_id: FieldId,
        foreign_table_id: TableId,
    },
}

/// A recorded lateral join request.
#[derive(Debug, Clone, PartialEq)]
pub struct LateralJoinRequest {
    pub alias: String,
    pub key: JoinKey,
    pub output_alias: String,
    pub column_type: LateralColumnType,
}

impl fmt::Display for LateralJoinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (via, table) = match &self.key {
            JoinKey::Link {
                link_field_id,
                foreign_table_id,
            } => (link_field_id, foreign_table_id),
            JoinKey::Conditional {
                host_field_id,
                foreign_table_id,
            } => (host_field_id, foreign_table_id),
        };
        write!(
            f,
            "{} on {} via {} -> \"{}\".\"{}\"",
            self.column_type.kind_name(),
            table,
            via,
            self.alias,
            self.output_alias
        )
    }
}

/// Recording planner: mints a fresh alias per request.
#[derive(Debug, Clone)]
pub struct LateralJoinPlan {
    prefix: String,
    requests: Vec<LateralJoinRequest>,
}

impl LateralJoinPlan {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[LateralJoinRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<LateralJoinRequest> {
        self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn record(&mut self, key: JoinKey, output_alias: &str, column_type: LateralColumnType) -> String {
        let alias = format!("{}{}", self.prefix, self.requests.len());
        trace!(alias = %alias, kind = column_type.kind_name(), "lateral join requested");
        self.requests.push(LateralJoinRequest {
            alias: alias.clone(),
            key,
            output_alias: output_alias.to_string(),
            column_type,
        });
        alias
    }
}

impl Default for LateralJoinPlan {
    fn default() -> Self {
        Self::new("lat_")
    }
}

impl LateralJoinPlanner for LateralJoinPlan {
    fn add_column(
        &mut self,
        link_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String {
        let key = JoinKey::Link {
            link_field_id: link_field_id.clone(),
            foreign_table_id: foreign_table_id.clone(),
        };
        self.record(key, output_alias, column_type)
    }

    fn add_conditional_column(
        &mut self,
        host_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String {
        let key = JoinKey::Conditional {
            host_field_id: host_field_id.clone(),
            foreign_table_id: foreign_table_id.clone(),
        };
        self.record(key, output_alias, column_type)
    }
}

/// Ordering of linked records for a link configuration.
///
/// Single-valued relationships need none. Many-many links, and one-many
/// links stored one-way, keep their order on the junction table; two-way
/// one-many links keep it on the foreign table.
pub fn resolve_link_order_by(link: &LinkOptions) -> Option<LinkOrderBy> {
    let order_column = link.has_order_column.then(|| link.order_column_name());
    match link.relationship {
        Relationship::OneOne | Relationship::ManyOne => None,
        Relationship::ManyMany => Some(junction(link, order_column)),
        Relationship::OneMany if link.is_one_way => Some(junction(link, order_column)),
        Relationship::OneMany => Some(LinkOrderBy::Foreign { order_column }),
    }
}

fn junction(link: &LinkOptions, order_column: Option<String>) -> LinkOrderBy {
    LinkOrderBy::Junction {
        junction_table: link.fk_host_table_name.clone(),
        self_key: link.self_key_name.clone(),
        foreign_key: link.foreign_key_name.clone(),
        order_column,
    }
}

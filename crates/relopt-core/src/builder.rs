//! Fluent construction of raw logical plans.
//!
//! ```
//! use relopt_core::builder::PlanBuilder;
//! use relopt_core::expr::{col, lit};
//!
//! let plan = PlanBuilder::scan("ventas")
//!     .filter(col("MONTO").gt(lit(2i64)))
//!     .project(vec![col("MONTO")])
//!     .build();
//! assert_eq!(plan.node_count(), 3);
//! ```

use crate::expr::Expr;
use crate::plan::{JoinType, LogicalPlan, TableScan};
use crate::schema::Schema;

#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan: LogicalPlan,
}

impl PlanBuilder {
    /// Unresolved scan; the analyzer fills in the schema from the catalog.
    pub fn scan(table: impl Into<String>) -> Self {
        Self {
            plan: LogicalPlan::Scan(TableScan::new(table)),
        }
    }

    /// Scan with a known schema, qualified by the table name.
    pub fn scan_with_schema(table: impl Into<String>, schema: Schema) -> Self {
        let mut scan = TableScan::new(table);
        scan.source_schema = schema.requalify(&scan.table);
        Self {
            plan: LogicalPlan::Scan(scan),
        }
    }

    pub fn from(plan: LogicalPlan) -> Self {
        Self { plan }
    }

    pub fn filter(self, predicate: Expr) -> Self {
        Self {
            plan: LogicalPlan::Filter {
                input: Box::new(self.plan),
                predicate,
            },
        }
    }

    pub fn project(self, exprs: Vec<Expr>) -> Self {
        Self {
            plan: LogicalPlan::Project {
                input: Box::new(self.plan),
                exprs,
            },
        }
    }

    pub fn join(self, right: LogicalPlan, join_type: JoinType, condition: Option<Expr>) -> Self {
        Self {
            plan: LogicalPlan::Join {
                left: Box::new(self.plan),
                right: Box::new(right),
                join_type,
                condition,
            },
        }
    }

    pub fn inner_join(self, right: LogicalPlan, condition: Expr) -> Self {
        self.join(right, JoinType::Inner, Some(condition))
    }

    pub fn cross_join(self, right: LogicalPlan) -> Self {
        self.join(right, JoinType::Cross, None)
    }

    pub fn aggregate(self, group_by: Vec<Expr>, aggregates: Vec<Expr>) -> Self {
        Self {
            plan: LogicalPlan::Aggregate {
                input: Box::new(self.plan),
                group_by,
                aggregates,
            },
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Self {
            plan: LogicalPlan::SubqueryAlias {
                input: Box::new(self.plan),
                alias: alias.into(),
            },
        }
    }

    pub fn build(self) -> LogicalPlan {
        self.plan
    }
}

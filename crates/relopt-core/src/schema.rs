//! Output schemas of plan nodes.
//!
//! A schema is an ordered list of fields. Each field may carry the relation
//! (table or alias) that qualifies it. Column references resolve by name and,
//! when qualified, by relation; a reference matching more than one field is
//! ambiguous.

use crate::error::SchemaError;
use crate::expr::{ColumnRef, DataType, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub relation: Option<String>,
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            relation: None,
            name: name.into(),
            data_type,
        }
    }

    pub fn with_relation(mut self, relation: Option<String>) -> Self {
        self.relation = relation;
        self
    }

    /// Fully qualified reference to this field.
    pub fn column(&self) -> ColumnRef {
        ColumnRef {
            relation: self.relation.clone(),
            name: self.name.clone(),
            index: None,
        }
    }

    pub fn column_expr(&self) -> Expr {
        Expr::Column(self.column())
    }

    fn matches(&self, column: &ColumnRef) -> bool {
        self.name == column.name
            && match column.relation {
                Some(ref r) => self.relation.as_deref() == Some(r.as_str()),
                None => true,
            }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.column(), self.data_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Position of the single field `column` resolves to.
    pub fn index_of(&self, column: &ColumnRef) -> Result<usize, SchemaError> {
        let mut found = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.matches(column))
            .map(|(i, _)| i);
        match (found.next(), found.next()) {
            (Some(i), None) => Ok(i),
            (None, _) => Err(SchemaError::ColumnNotFound(column.to_string())),
            (Some(_), Some(_)) => Err(SchemaError::AmbiguousColumn(column.to_string())),
        }
    }

    pub fn field_for(&self, column: &ColumnRef) -> Result<&Field, SchemaError> {
        let i = self.index_of(column)?;
        Ok(&self.fields[i])
    }

    /// Whether every column of `expr` resolves unambiguously in this schema.
    pub fn resolves(&self, expr: &Expr) -> bool {
        expr.columns().into_iter().all(|c| self.index_of(c).is_ok())
    }

    /// Concatenation of `self` followed by `other`, as produced by a join.
    pub fn join(&self, other: &Schema) -> Schema {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Schema { fields }
    }

    /// Every field requalified by `relation`.
    pub fn requalify(&self, relation: &str) -> Schema {
        Schema {
            fields: self
                .fields
                .iter()
                .map(|f| f.clone().with_relation(Some(relation.to_string())))
                .collect(),
        }
    }

    /// Fields at `indices`, in the given order.
    pub fn project(&self, indices: &[usize]) -> Option<Schema> {
        let fields = indices
            .iter()
            .map(|&i| self.fields.get(i).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Schema { fields })
    }

    /// Whether no two fields share the same qualified name.
    pub fn has_unique_qualified_names(&self) -> bool {
        self.fields.iter().enumerate().all(|(i, f)| {
            self.fields[i + 1..]
                .iter()
                .all(|g| g.name != f.name || g.relation != f.relation)
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|fd| fd.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

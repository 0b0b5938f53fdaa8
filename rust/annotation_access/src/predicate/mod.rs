//! Structured filter predicates.
//!
//! Access decisions are expressed as an [`Expr`] tree over named row fields.
//! In-memory stores evaluate it directly via [`Expr::eval`]; relational stores
//! hand it to [`sql::render`] to get a parameterized `WHERE` clause.

pub mod sql;

use serde::{Deserialize, Serialize};

use crate::types::{AnnotationItem, Dashboard, Folder};

/// Typed operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Predicate tree. `And`/`Or` are n-ary; an empty `And` is true and an empty
/// `Or` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    True,
    False,
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn eq(field: &str, value: impl Into<Value>) -> Expr {
        Expr::Eq(field.to_string(), value.into())
    }

    /// Membership test. An empty list never matches.
    pub fn in_list<I, V>(field: &str, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Expr::False;
        }
        Expr::In(field.to_string(), values)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Expr {
        Expr::Gte(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Expr {
        Expr::Lte(field.to_string(), value.into())
    }

    pub fn is_null(field: &str) -> Expr {
        Expr::IsNull(field.to_string())
    }

    pub fn and(self, rhs: Expr) -> Expr {
        Expr::all(vec![self, rhs])
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::any(vec![self, rhs])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        match self {
            Expr::True => Expr::False,
            Expr::False => Expr::True,
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    /// Conjunction with constant folding and flattening.
    pub fn all(exprs: Vec<Expr>) -> Expr {
        let mut out = Vec::with_capacity(exprs.len());
        for e in exprs {
            match e {
                Expr::True => {}
                Expr::False => return Expr::False,
                Expr::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::True,
            1 => out.pop().unwrap_or(Expr::True),
            _ => Expr::And(out),
        }
    }

    /// Disjunction with constant folding and flattening.
    pub fn any(exprs: Vec<Expr>) -> Expr {
        let mut out = Vec::with_capacity(exprs.len());
        for e in exprs {
            match e {
                Expr::False => {}
                Expr::True => return Expr::True,
                Expr::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::False,
            1 => out.pop().unwrap_or(Expr::False),
            _ => Expr::Or(out),
        }
    }

    /// Evaluate against a row. Unknown fields read as `Null`, so a typo in a
    /// field name filters rows out rather than letting them through.
    pub fn eval<R: Row + ?Sized>(&self, row: &R) -> bool {
        match self {
            Expr::True => true,
            Expr::False => false,
            Expr::Eq(field, value) => {
                let actual = row.field(field);
                actual != Value::Null && &actual == value
            }
            Expr::Gte(field, value) => match (row.field(field), value) {
                (Value::Int(a), Value::Int(b)) => a >= *b,
                _ => false,
            },
            Expr::Lte(field, value) => match (row.field(field), value) {
                (Value::Int(a), Value::Int(b)) => a <= *b,
                _ => false,
            },
            Expr::In(field, values) => {
                let actual = row.field(field);
                actual != Value::Null && values.contains(&actual)
            }
            Expr::IsNull(field) => row.field(field) == Value::Null,
            Expr::And(exprs) => exprs.iter().all(|e| e.eval(row)),
            Expr::Or(exprs) => exprs.iter().any(|e| e.eval(row)),
            Expr::Not(inner) => !inner.eval(row),
        }
    }
}

/// Field access for predicate evaluation.
pub trait Row {
    fn field(&self, name: &str) -> Value;
}

impl Row for Dashboard {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "uid" => Value::Str(self.uid.clone()),
            "org_id" => Value::Int(self.org_id),
            "folder_uid" => self.folder_uid.clone().into(),
            "title" => Value::Str(self.title.clone()),
            "is_folder" => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

impl Row for Folder {
    fn field(&self, name: &str) -> Value {
        match name {
            "uid" => Value::Str(self.uid.clone()),
            "org_id" => Value::Int(self.org_id),
            "parent_uid" => self.parent_uid.clone().into(),
            "title" => Value::Str(self.title.clone()),
            "is_folder" => Value::Bool(true),
            _ => Value::Null,
        }
    }
}

impl Row for AnnotationItem {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "org_id" => Value::Int(self.org_id),
            "dashboard_id" => Value::Int(self.dashboard_id),
            "dashboard_uid" => self.dashboard_uid.clone().into(),
            "panel_id" => Value::Int(self.panel_id),
            "alert_id" => Value::Int(self.alert_id),
            "user_id" => Value::Int(self.user_id),
            "epoch" => Value::Int(self.time),
            "epoch_end" => Value::Int(self.time_end),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dash(uid: &str, folder: Option<&str>) -> Dashboard {
        Dashboard {
            id: 1,
            uid: uid.to_string(),
            org_id: 1,
            folder_uid: folder.map(str::to_string),
            title: uid.to_string(),
        }
    }

    #[test]
    fn constant_folding() {
        assert_eq!(Expr::all(vec![]), Expr::True);
        assert_eq!(Expr::any(vec![]), Expr::False);
        assert_eq!(Expr::eq("a", 1).and(Expr::False), Expr::False);
        assert_eq!(Expr::eq("a", 1).or(Expr::True), Expr::True);
        assert_eq!(Expr::True.and(Expr::eq("a", 1)), Expr::eq("a", 1));
        assert_eq!(Expr::in_list::<_, i64>("a", vec![]), Expr::False);
        assert_eq!(Expr::True.not(), Expr::False);
    }

    #[test]
    fn nested_conjunctions_flatten() {
        let e = Expr::eq("a", 1).and(Expr::eq("b", 2)).and(Expr::eq("c", 3));
        match e {
            Expr::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn eval_dashboard_rows() {
        let d = dash("d1", Some("f1"));
        assert!(Expr::in_list("folder_uid", vec!["f1", "f2"]).eval(&d));
        assert!(!Expr::is_null("folder_uid").eval(&d));
        assert!(Expr::eq("is_folder", false).eval(&d));

        let root = dash("d2", None);
        assert!(Expr::is_null("folder_uid").eval(&root));
        // Null never equals anything, including through IN.
        assert!(!Expr::in_list("folder_uid", vec!["f1"]).eval(&root));
    }

    #[test]
    fn range_comparisons_only_apply_to_integers() {
        let d = dash("d1", None);
        assert!(Expr::gte("org_id", 1).eval(&d));
        assert!(Expr::lte("org_id", 1).eval(&d));
        assert!(!Expr::gte("org_id", 2).eval(&d));
        assert!(!Expr::gte("uid", "a").eval(&d));
    }

    #[test]
    fn unknown_field_fails_closed() {
        let d = dash("d1", None);
        assert!(!Expr::eq("no_such_field", "x").eval(&d));
        assert!(!Expr::in_list("no_such_field", vec!["x"]).eval(&d));
    }
}

//! SQL rendering for [`Expr`] predicates.
//!
//! Output is always parameterized: operands go into `args`, never into the
//! statement text.

use super::{Expr, Value};

/// Placeholder flavour of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` placeholders (SQLite, MySQL).
    Question,
    /// `$1, $2, …` placeholders (PostgreSQL).
    Numbered,
}

/// Rendered statement or clause plus its bound arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Renders predicates, optionally qualifying columns with a table alias.
pub struct SqlRenderer {
    dialect: Dialect,
    alias: Option<String>,
    sql: String,
    args: Vec<Value>,
}

impl SqlRenderer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            alias: None,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Continue numbering after arguments already bound elsewhere in the statement.
    fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn render(mut self, expr: &Expr) -> SqlFragment {
        self.write(expr);
        SqlFragment {
            sql: self.sql,
            args: self.args,
        }
    }

    fn column(&self, field: &str) -> String {
        match &self.alias {
            Some(alias) => format!("{alias}.{field}"),
            None => field.to_string(),
        }
    }

    fn placeholder(&mut self, value: &Value) -> String {
        self.args.push(value.clone());
        match self.dialect {
            Dialect::Question => "?".to_string(),
            Dialect::Numbered => format!("${}", self.args.len()),
        }
    }

    fn write(&mut self, expr: &Expr) {
        match expr {
            Expr::True => self.sql.push_str("1 = 1"),
            Expr::False => self.sql.push_str("1 = 0"),
            Expr::Eq(field, Value::Null) | Expr::IsNull(field) => {
                let col = self.column(field);
                self.sql.push_str(&format!("{col} IS NULL"));
            }
            Expr::Eq(field, value) => self.comparison(field, "=", value),
            Expr::Gte(field, value) => self.comparison(field, ">=", value),
            Expr::Lte(field, value) => self.comparison(field, "<=", value),
            Expr::In(field, values) => {
                if values.is_empty() {
                    self.sql.push_str("1 = 0");
                    return;
                }
                let col = self.column(field);
                let marks: Vec<String> = values.iter().map(|v| self.placeholder(v)).collect();
                self.sql
                    .push_str(&format!("{col} IN ({})", marks.join(", ")));
            }
            Expr::And(exprs) => self.join(exprs, " AND ", "1 = 1"),
            Expr::Or(exprs) => self.join(exprs, " OR ", "1 = 0"),
            Expr::Not(inner) => {
                self.sql.push_str("NOT (");
                self.write(inner);
                self.sql.push(')');
            }
        }
    }

    fn comparison(&mut self, field: &str, op: &str, value: &Value) {
        let col = self.column(field);
        let mark = self.placeholder(value);
        self.sql.push_str(&format!("{col} {op} {mark}"));
    }

    fn join(&mut self, exprs: &[Expr], sep: &str, empty: &str) {
        if exprs.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            self.write(e);
        }
        self.sql.push(')');
    }
}

/// Render `expr` without a table alias.
pub fn render(expr: &Expr, dialect: Dialect) -> SqlFragment {
    SqlRenderer::new(dialect).render(expr)
}

/// Recursive descendant closure of `seeds` within one org.
///
/// Seed rows are the granted folders; each round joins their children until
/// no new rows appear. `UNION` (not `UNION ALL`) keeps the fixed point finite
/// on corrupt, cyclic parent data.
pub fn folder_closure_cte(seeds: &[String], org_id: i64, dialect: Dialect) -> SqlFragment {
    let seed_filter = Expr::in_list("uid", seeds.iter().cloned()).and(Expr::eq("org_id", org_id));
    let seed = SqlRenderer::new(dialect).render(&seed_filter);
    let sql = format!(
        "WITH RECURSIVE folder_closure AS (\
SELECT uid, parent_uid, org_id FROM folder WHERE {} \
UNION \
SELECT f.uid, f.parent_uid, f.org_id FROM folder f \
INNER JOIN folder_closure c ON f.parent_uid = c.uid AND f.org_id = c.org_id\
) SELECT uid FROM folder_closure",
        seed.sql
    );
    SqlFragment {
        sql,
        args: seed.args,
    }
}

/// Annotation listing over table alias `a`, newest first.
pub fn annotation_select(filter: &Expr, limit: usize, dialect: Dialect) -> SqlFragment {
    let where_clause = SqlRenderer::new(dialect).with_alias("a").render(filter);
    let mut renderer = SqlRenderer::new(dialect).with_args(where_clause.args);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let limit_mark = renderer.placeholder(&Value::Int(limit));
    SqlFragment {
        sql: format!(
            "SELECT a.id, a.org_id, a.dashboard_id, a.dashboard_uid, a.panel_id, a.alert_id, \
a.user_id, a.text, a.epoch, a.epoch_end, a.created, a.updated \
FROM annotation AS a WHERE {} ORDER BY a.epoch_end DESC, a.epoch DESC LIMIT {}",
            where_clause.sql, limit_mark
        ),
        args: renderer.args,
    }
}

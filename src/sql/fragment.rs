//! SQL fragments with deferred placeholder numbering.

use crate::dialect::SqlGenerator;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Sql(String),
    Param(Value),
}

/// SQL text interleaved with bound values.
///
/// Placeholders are only numbered when the fragment is finalised against a
/// generator, so fragments from several interpreters can be concatenated
/// first and still come out as `$1, $2, ...` in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    parts: Vec<Part>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sql(text: impl Into<String>) -> Self {
        let mut f = Self::new();
        f.push_sql(text);
        f
    }

    pub fn push_sql(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Sql(last)) => last.push_str(&text),
            _ => self.parts.push(Part::Sql(text)),
        }
        self
    }

    pub fn push_param(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(Part::Param(value.into()));
        self
    }

    /// Push `values` as a comma separated placeholder list.
    pub fn push_params<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push_sql(", ");
            }
            self.push_param(value);
        }
        self
    }

    pub fn append(&mut self, other: Fragment) -> &mut Self {
        for part in other.parts {
            match part {
                Part::Sql(s) => {
                    self.push_sql(s);
                }
                Part::Param(v) => {
                    self.push_param(v);
                }
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param(v) => Some(v),
            Part::Sql(_) => None,
        })
    }

    /// Number placeholders and collect bound values. NULL is written
    /// inline: an untyped bound null is rejected by PostgreSQL when the
    /// target column is not text.
    pub fn to_statement(&self, generator: &dyn SqlGenerator) -> Statement {
        let mut ctx = ParamContext::new();
        let mut sql = String::new();
        for part in &self.parts {
            match part {
                Part::Sql(s) => sql.push_str(s),
                Part::Param(Value::Null) => sql.push_str("NULL"),
                Part::Param(v) => sql.push_str(&ctx.add_param(v.clone(), generator)),
            }
        }
        Statement {
            sql,
            params: ctx.params,
        }
    }

    /// Interpolated wire form, for logs and assertions. Never execute this.
    pub fn inline(&self) -> String {
        let mut sql = String::new();
        for part in &self.parts {
            match part {
                Part::Sql(s) => sql.push_str(s),
                Part::Param(v) => sql.push_str(&v.to_string()),
            }
        }
        sql
    }
}

impl From<&str> for Fragment {
    fn from(s: &str) -> Self {
        Fragment::sql(s)
    }
}

impl From<String> for Fragment {
    fn from(s: String) -> Self {
        Fragment::sql(s)
    }
}

/// Context for parameterized statement building.
#[derive(Debug, Default)]
pub struct ParamContext {
    /// Current parameter index (1-based for Postgres $1, $2, etc.)
    pub index: usize,
    /// Collected parameter values in order
    pub params: Vec<Value>,
}

impl ParamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the placeholder for it.
    pub fn add_param(&mut self, value: Value, generator: &dyn SqlGenerator) -> String {
        self.index += 1;
        self.params.push(value);
        generator.placeholder(self.index)
    }
}

/// A finalised statement: dialect SQL plus its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement with no bound values (DDL, raw queries).
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Substitute `?` / `$n` placeholders with their values. Logging only.
    pub fn inline(&self) -> String {
        if self.params.is_empty() {
            return self.sql.clone();
        }
        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.chars().peekable();
        let mut next = 0;
        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    match self.params.get(next) {
                        Some(v) => out.push_str(&v.to_string()),
                        None => out.push('?'),
                    }
                    next += 1;
                }
                '$' if chars.peek().is_some_and(|d| d.is_ascii_digit()) => {
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    let value = digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| self.params.get(i));
                    match value {
                        Some(v) => out.push_str(&v.to_string()),
                        None => {
                            out.push('$');
                            out.push_str(&digits);
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Engine;

    fn sample() -> Fragment {
        let mut f = Fragment::sql("SELECT * FROM t WHERE a = ");
        f.push_param(1).push_sql(" AND b = ").push_param("x");
        f
    }

    #[test]
    fn test_postgres_numbering() {
        let stmt = sample().to_statement(Engine::Postgres.generator());
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Text("x".into())]);
    }

    #[test]
    fn test_mysql_numbering() {
        let stmt = sample().to_statement(Engine::MySql.generator());
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = ? AND b = ?");
    }

    #[test]
    fn test_append_continues_numbering() {
        let mut f = sample();
        let mut tail = Fragment::sql(" OR c = ");
        tail.push_param(true);
        f.append(tail);
        let stmt = f.to_statement(Engine::Cockroach.generator());
        assert!(stmt.sql.ends_with("OR c = $3"));
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_inline() {
        assert_eq!(sample().inline(), "SELECT * FROM t WHERE a = 1 AND b = x");
    }

    #[test]
    fn test_statement_inline_matches_fragment() {
        for engine in Engine::ALL {
            let stmt = sample().to_statement(engine.generator());
            assert_eq!(stmt.inline(), sample().inline(), "{engine}");
        }
    }

    #[test]
    fn test_null_is_written_inline() {
        let mut f = Fragment::sql("INSERT INTO t (a, b, c) VALUES (");
        f.push_param(1)
            .push_sql(", ")
            .push_param(Value::Null)
            .push_sql(", ")
            .push_param("x")
            .push_sql(")");
        let stmt = f.to_statement(Engine::Postgres.generator());
        assert_eq!(stmt.sql, "INSERT INTO t (a, b, c) VALUES ($1, NULL, $2)");
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Text("x".into())]);
    }
}

use crate::error::Result;
use crate::roles::RolePredicate;
use crate::types::SectionKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Section kind an expression was declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// A `[matchers]` entry deciding whether a policy row applies to a request.
    Matcher,
    /// A `[policy_effect]` entry combining matched rows into one outcome.
    PolicyEffect,
}

/// Compiled boolean predicate over an [`EvalContext`].
#[derive(Clone)]
pub struct CompiledExpr(Arc<dyn Fn(&EvalContext) -> bool + Send + Sync>);

impl CompiledExpr {
    /// Wraps a predicate function.
    pub fn from_fn(f: impl Fn(&EvalContext) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Returns a predicate with a fixed outcome.
    pub fn always(value: bool) -> Self {
        Self::from_fn(move |_| value)
    }

    /// Evaluates the predicate against a context.
    pub fn eval(&self, ctx: &EvalContext) -> bool {
        (self.0)(ctx)
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledExpr(..)")
    }
}

/// Expression backend turning matcher/effect source text into executable predicates.
///
/// The engine never inspects how the contract is fulfilled; hosts plug in a real
/// expression language, while [`NaiveCompiler`] covers setups with no decision logic.
pub trait ExpressionCompiler: Send + Sync {
    /// Compiles `source` declared under `key` in a section of the given kind.
    fn compile(&self, source: &str, key: &SectionKey, kind: ExprKind) -> Result<CompiledExpr>;
}

impl<F> ExpressionCompiler for F
where
    F: Fn(&str, &SectionKey, ExprKind) -> Result<CompiledExpr> + Send + Sync,
{
    fn compile(&self, source: &str, key: &SectionKey, kind: ExprKind) -> Result<CompiledExpr> {
        self(source, key, kind)
    }
}

/// Default backend: every expression compiles to `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveCompiler;

impl ExpressionCompiler for NaiveCompiler {
    fn compile(&self, _source: &str, _key: &SectionKey, _kind: ExprKind) -> Result<CompiledExpr> {
        Ok(CompiledExpr::always(true))
    }
}

/// One entry of an [`EvalContext`].
#[derive(Debug, Clone)]
pub enum ContextValue {
    /// Field record for `r`/`p` keys.
    Record(HashMap<String, String>),
    /// Role-membership predicate for `g` keys.
    Roles(RolePredicate),
    /// Sibling matcher/effect predicate for `m`/`e` keys.
    Expr(CompiledExpr),
}

/// Evaluation context handed to compiled predicates, built fresh per policy row.
#[derive(Debug, Default)]
pub struct EvalContext {
    entries: HashMap<String, ContextValue>,
}

impl EvalContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field record under a key token.
    pub fn insert_record(&mut self, key: impl Into<String>, record: HashMap<String, String>) {
        self.entries.insert(key.into(), ContextValue::Record(record));
    }

    /// Inserts a role-membership predicate under a key token.
    pub fn insert_roles(&mut self, key: impl Into<String>, predicate: RolePredicate) {
        self.entries.insert(key.into(), ContextValue::Roles(predicate));
    }

    /// Inserts a sibling expression under a key token.
    pub fn insert_expr(&mut self, key: impl Into<String>, expr: CompiledExpr) {
        self.entries.insert(key.into(), ContextValue::Expr(expr));
    }

    /// Returns the record stored under a key, if any.
    pub fn record(&self, key: &str) -> Option<&HashMap<String, String>> {
        match self.entries.get(key) {
            Some(ContextValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Returns one field of a record (`field("r", "sub")` reads `r.sub`).
    pub fn field(&self, key: &str, field: &str) -> Option<&str> {
        self.record(key)
            .and_then(|record| record.get(field))
            .map(String::as_str)
    }

    /// Returns whether a record has a field (`"sub" in r`).
    pub fn has_field(&self, key: &str, field: &str) -> bool {
        self.record(key).is_some_and(|record| record.contains_key(field))
    }

    /// Invokes the role predicate stored under a key (`g(r.sub, p.sub)`).
    ///
    /// Returns `None` when no predicate was recorded for the key.
    pub fn call_role(&self, key: &str, args: &[&str]) -> Option<bool> {
        match self.entries.get(key) {
            Some(ContextValue::Roles(predicate)) => Some(predicate.matches(args)),
            _ => None,
        }
    }

    /// Returns the sibling expression stored under a key, if any.
    pub fn expr(&self, key: &str) -> Option<&CompiledExpr> {
        match self.entries.get(key) {
            Some(ContextValue::Expr(expr)) => Some(expr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleRegistry;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn naive_compiler_always_matches() {
        let key = SectionKey::new("m").unwrap();
        let expr = NaiveCompiler.compile("whatever", &key, ExprKind::Matcher).unwrap();
        assert!(expr.eval(&EvalContext::new()));
    }

    #[test]
    fn context_exposes_record_fields() {
        let mut ctx = EvalContext::new();
        ctx.insert_record("r", record(&[("sub", "alice"), ("act", "read")]));

        assert_eq!(ctx.field("r", "sub"), Some("alice"));
        assert_eq!(ctx.field("r", "obj"), None);
        assert!(ctx.has_field("r", "act"));
        assert!(!ctx.has_field("r", "obj"));
        assert!(!ctx.has_field("p", "act"));
    }

    #[test]
    fn context_invokes_role_predicates() {
        let rows = vec![vec!["g".to_string(), "alice".to_string(), "reader".to_string()]];
        let roles = RoleRegistry::from_rows(&rows).unwrap();

        let mut ctx = EvalContext::new();
        ctx.insert_roles("g", roles.predicate("g").unwrap());

        assert_eq!(ctx.call_role("g", &["alice", "reader"]), Some(true));
        assert_eq!(ctx.call_role("g", &["alice", "writer"]), Some(false));
        assert_eq!(ctx.call_role("g2", &["alice", "reader"]), None);
    }

    #[test]
    fn sibling_expressions_are_reachable() {
        let mut ctx = EvalContext::new();
        ctx.insert_expr("e", CompiledExpr::always(false));

        assert!(!ctx.expr("e").unwrap().eval(&EvalContext::new()));
        assert!(ctx.expr("m").is_none());
    }
}

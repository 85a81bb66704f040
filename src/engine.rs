use crate::error::{Error, Result};
use crate::expr::{CompiledExpr, EvalContext, ExpressionCompiler};
use crate::model::{Model, parse_model};
use crate::permission::PermissionIndex;
use crate::roles::RoleRegistry;
use crate::types::SectionKey;
use std::collections::HashMap;

/// Policy source: model text plus tabular policy and role rows.
///
/// Each row's first element is the [`SectionKey`] token it belongs to (`p`,
/// `p2`, `g`, ...); the remainder are field values matched positionally against
/// the corresponding definition. The serde names mirror the `{m, p, g}` wire
/// shape emitted by policy backends.
#[derive(Debug, Default, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PolicySource {
    /// Model source text.
    #[serde(rename = "m")]
    pub model: String,
    /// Policy rows.
    #[serde(rename = "p", default)]
    pub policy_rows: Vec<Vec<String>>,
    /// Role grouping rows.
    #[serde(rename = "g", default)]
    pub role_rows: Vec<Vec<String>>,
}

/// Options for one evaluation pass.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    request: Option<Vec<String>>,
    permission_fields: (String, String),
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            request: None,
            permission_fields: ("act".to_string(), "obj".to_string()),
        }
    }
}

impl EvaluateOptions {
    /// Creates options for an unfiltered evaluation with default fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrows the evaluation to one request: `[group, field values...]`.
    ///
    /// The group token selects the active instance (`r` for 1, `r2` for 2, ...).
    /// Field values are matched positionally against the policy definition;
    /// values left out fall back to the policy row under test, so supplying
    /// only the subject is enough to ask "everything this subject may do".
    pub fn request<I, T>(mut self, request: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.request = Some(request.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the policy fields used as permission key and value.
    ///
    /// Defaults to `("act", "obj")`: the index maps actions to object lists.
    pub fn permission_fields(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.permission_fields = (key.into(), value.into());
        self
    }
}

struct ActiveRequest<'a> {
    key: SectionKey,
    fields: &'a [String],
    matcher: &'a CompiledExpr,
}

/// Parses the model of a policy source and compiles its rows into a
/// [`PermissionIndex`].
pub fn evaluate(
    source: &PolicySource,
    compiler: &dyn ExpressionCompiler,
    options: &EvaluateOptions,
) -> Result<PermissionIndex> {
    let model = parse_model(&source.model, compiler)?;
    evaluate_model(&model, &source.policy_rows, &source.role_rows, options)
}

/// Compiles policy rows into a [`PermissionIndex`] against an already parsed
/// model.
///
/// Without a request the full policy table of the active instance is reshaped
/// into the index. With a request, each row is matched through the instance's
/// matcher predicate over a context holding the request record, the policy
/// record, every role predicate, and every sibling matcher/effect predicate;
/// only matching rows contribute.
pub fn evaluate_model(
    model: &Model,
    policy_rows: &[Vec<String>],
    role_rows: &[Vec<String>],
    options: &EvaluateOptions,
) -> Result<PermissionIndex> {
    let request = active_request(model, options)?;
    let active = request.as_ref().map_or(1, |req| req.key.instance());
    let roles = RoleRegistry::from_rows(role_rows)?;
    let (key_field, value_field) = &options.permission_fields;

    let mut index = PermissionIndex::new();
    for row in policy_rows {
        let Some((token, values)) = row.split_first() else {
            continue;
        };
        let policy_key = SectionKey::new(token)?;
        if policy_key.instance() != active {
            continue;
        }

        let definition = model
            .policy_definition
            .get(policy_key.as_str())
            .ok_or_else(|| Error::MissingPolicyDefinition {
                key: policy_key.clone(),
            })?;
        let policy_record = zip_record(definition, values, None);

        let action = permission_field(&policy_record, key_field, &policy_key)?;
        let object = permission_field(&policy_record, value_field, &policy_key)?;

        match &request {
            None => index.grant(action, object),
            Some(req) => {
                let request_record = zip_record(definition, req.fields, Some(&policy_record));
                let ctx = build_context(
                    model,
                    &roles,
                    (req.key.as_str(), request_record),
                    (policy_key.as_str(), policy_record),
                );
                if req.matcher.eval(&ctx) {
                    index.grant(action, object);
                }
            }
        }
    }
    Ok(index)
}

fn active_request<'a>(model: &'a Model, options: &'a EvaluateOptions) -> Result<Option<ActiveRequest<'a>>> {
    let Some(request) = &options.request else {
        return Ok(None);
    };
    let Some((token, fields)) = request.split_first() else {
        return Err(Error::InvalidSectionKey("empty request".to_string()));
    };
    let key = SectionKey::new(token)?;

    let matcher_key = SectionKey::for_instance('m', key.instance());
    let matcher = model
        .matchers
        .get(matcher_key.as_str())
        .ok_or(Error::MissingMatcher { key: matcher_key })?;

    Ok(Some(ActiveRequest {
        key,
        fields,
        matcher,
    }))
}

fn permission_field(
    record: &HashMap<String, String>,
    field: &str,
    key: &SectionKey,
) -> Result<String> {
    record
        .get(field)
        .cloned()
        .ok_or_else(|| Error::MissingPermissionField {
            field: field.to_string(),
            key: key.clone(),
        })
}

// Fields with neither a positional value nor a fallback stay absent from the
// record; matcher predicates observe them through `has_field`.
fn zip_record(
    definition: &[String],
    values: &[String],
    fallback: Option<&HashMap<String, String>>,
) -> HashMap<String, String> {
    definition
        .iter()
        .enumerate()
        .filter_map(|(i, field)| {
            values
                .get(i)
                .cloned()
                .or_else(|| fallback.and_then(|record| record.get(field).cloned()))
                .map(|value| (field.clone(), value))
        })
        .collect()
}

fn build_context(
    model: &Model,
    roles: &RoleRegistry,
    request: (&str, HashMap<String, String>),
    policy: (&str, HashMap<String, String>),
) -> EvalContext {
    let mut ctx = EvalContext::new();
    ctx.insert_record(request.0, request.1);
    ctx.insert_record(policy.0, policy.1);
    for (key, predicate) in roles.iter() {
        ctx.insert_roles(key.as_str(), predicate.clone());
    }
    for (key, expr) in &model.matchers {
        ctx.insert_expr(key.as_str(), expr.clone());
    }
    for (key, expr) in &model.policy_effect {
        ctx.insert_expr(key.as_str(), expr.clone());
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{CompiledExpr, ExprKind, NaiveCompiler};

    const SIMPLE_MODEL: &str = "
        [request_definition]
        r = sub, obj, act

        [policy_definition]
        p = sub, obj, act

        [role_definition]
        g = _, _

        [policy_effect]
        e = some(where (p.eft == allow))

        [matchers]
        m = r.obj == p.obj && r.act == p.act && \"sub\" in r && g(r.sub, p.sub)
    ";

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn simple_source() -> PolicySource {
        PolicySource {
            model: SIMPLE_MODEL.to_string(),
            policy_rows: rows(&[
                &["p", "reader", "data", "read"],
                &["p", "writer", "data", "write"],
                &["p", "admin", "data", "delete"],
            ]),
            role_rows: rows(&[
                &["g", "alice", "reader"],
                &["g", "alice", "writer"],
                &["g", "bob", "reader"],
                &["g", "cathy", "admin"],
            ]),
        }
    }

    /// Hand-built equivalent of the model's matcher text, standing in for a
    /// real expression backend.
    fn role_matcher() -> CompiledExpr {
        CompiledExpr::from_fn(|ctx| {
            let shape_matches = ctx.field("r", "obj") == ctx.field("p", "obj")
                && ctx.field("r", "act") == ctx.field("p", "act")
                && ctx.has_field("r", "sub");
            if !shape_matches {
                return false;
            }
            match (ctx.field("r", "sub"), ctx.field("p", "sub")) {
                (Some(sub), Some(role)) => ctx.call_role("g", &[sub, role]).unwrap_or(false),
                _ => false,
            }
        })
    }

    fn role_compiler(
        source: &str,
        key: &SectionKey,
        kind: ExprKind,
    ) -> crate::error::Result<CompiledExpr> {
        let _ = (source, key);
        Ok(match kind {
            ExprKind::Matcher => role_matcher(),
            ExprKind::PolicyEffect => CompiledExpr::always(true),
        })
    }

    #[test]
    fn unfiltered_should_reshape_full_policy_table() {
        let index = evaluate(&simple_source(), &NaiveCompiler, &EvaluateOptions::new()).unwrap();

        assert_eq!(index.objects("read").unwrap(), &["data"]);
        assert_eq!(index.objects("write").unwrap(), &["data"]);
        assert_eq!(index.objects("delete").unwrap(), &["data"]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn unfiltered_should_count_rows_per_key() {
        let mut source = simple_source();
        source.policy_rows = rows(&[
            &["p", "reader", "data", "read"],
            &["p", "reader", "users", "read"],
            &["p", "auditor", "logs", "read"],
            &["p", "writer", "data", "write"],
        ]);

        let index = evaluate(&source, &NaiveCompiler, &EvaluateOptions::new()).unwrap();
        assert_eq!(index.objects("read").unwrap(), &["data", "users", "logs"]);
        assert_eq!(index.objects("write").unwrap(), &["data"]);
    }

    #[test]
    fn off_instance_rows_should_stay_invisible() {
        let mut source = simple_source();
        source.model.push_str("\n[policy_definition]\np2 = sub, obj, act\n");
        source
            .policy_rows
            .push(vec!["p2".into(), "x".into(), "y".into(), "read".into()]);

        let index = evaluate(&source, &NaiveCompiler, &EvaluateOptions::new()).unwrap();
        assert_eq!(index.objects("read").unwrap(), &["data"]);
    }

    #[test]
    fn request_should_filter_by_subject_through_roles() {
        let source = simple_source();

        let alice = evaluate(
            &source,
            &role_compiler,
            &EvaluateOptions::new().request(["r", "alice"]),
        )
        .unwrap();
        assert_eq!(alice.objects("read").unwrap(), &["data"]);
        assert_eq!(alice.objects("write").unwrap(), &["data"]);
        assert_eq!(alice.grants("delete", "data"), None);

        let bob = evaluate(
            &source,
            &role_compiler,
            &EvaluateOptions::new().request(["r", "bob"]),
        )
        .unwrap();
        assert_eq!(bob.objects("read").unwrap(), &["data"]);
        assert_eq!(bob.len(), 1);
    }

    #[test]
    fn request_should_match_subjects_directly_without_roles() {
        fn subject_compiler(_: &str, _: &SectionKey, kind: ExprKind) -> Result<CompiledExpr> {
            Ok(match kind {
                ExprKind::Matcher => {
                    CompiledExpr::from_fn(|ctx| ctx.field("p", "sub") == ctx.field("r", "sub"))
                }
                ExprKind::PolicyEffect => CompiledExpr::always(true),
            })
        }

        let reader = evaluate(
            &simple_source(),
            &subject_compiler,
            &EvaluateOptions::new().request(["r", "reader"]),
        )
        .unwrap();
        assert_eq!(reader.objects("read").unwrap(), &["data"]);
        assert_eq!(reader.len(), 1);

        let writer = evaluate(
            &simple_source(),
            &subject_compiler,
            &EvaluateOptions::new().request(["r", "writer"]),
        )
        .unwrap();
        assert_eq!(writer.objects("write").unwrap(), &["data"]);
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn missing_request_fields_should_fall_back_to_policy_row() {
        fn act_compiler(_: &str, _: &SectionKey, kind: ExprKind) -> Result<CompiledExpr> {
            Ok(match kind {
                ExprKind::Matcher => {
                    CompiledExpr::from_fn(|ctx| ctx.field("r", "act") == Some("read"))
                }
                ExprKind::PolicyEffect => CompiledExpr::always(true),
            })
        }

        // Only the subject is supplied; r.act takes each row's own value.
        let index = evaluate(
            &simple_source(),
            &act_compiler,
            &EvaluateOptions::new().request(["r", "alice"]),
        )
        .unwrap();
        assert_eq!(index.objects("read").unwrap(), &["data"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn second_instance_should_use_its_own_matcher_and_rows() {
        let source = PolicySource {
            model: "
                [request_definition]
                r2 = sub, act

                [policy_definition]
                p2 = sub, act

                [matchers]
                m2 = r2.sub == p2.sub
            "
            .to_string(),
            policy_rows: rows(&[
                &["p2", "bob", "ping"],
                &["p2", "eve", "pong"],
                &["p", "bob", "data", "read"],
            ]),
            role_rows: Vec::new(),
        };
        fn instance_compiler(_: &str, _: &SectionKey, kind: ExprKind) -> Result<CompiledExpr> {
            Ok(match kind {
                ExprKind::Matcher => {
                    CompiledExpr::from_fn(|ctx| ctx.field("r2", "sub") == ctx.field("p2", "sub"))
                }
                ExprKind::PolicyEffect => CompiledExpr::always(true),
            })
        }

        let index = evaluate(
            &source,
            &instance_compiler,
            &EvaluateOptions::new()
                .request(["r2", "bob"])
                .permission_fields("act", "sub"),
        )
        .unwrap();

        assert_eq!(index.objects("ping").unwrap(), &["bob"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn custom_permission_fields_should_reshape_the_index() {
        let index = evaluate(
            &simple_source(),
            &NaiveCompiler,
            &EvaluateOptions::new().permission_fields("obj", "act"),
        )
        .unwrap();

        assert_eq!(index.objects("data").unwrap(), &["read", "write", "delete"]);
    }

    #[test]
    fn missing_matcher_should_fail_naming_the_key() {
        let err = evaluate(
            &simple_source(),
            &NaiveCompiler,
            &EvaluateOptions::new().request(["r2", "alice"]),
        )
        .unwrap_err();

        match err {
            Error::MissingMatcher { key } => assert_eq!(key.as_str(), "m2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_policy_definition_should_fail_naming_the_key() {
        let source = PolicySource {
            model: "[request_definition]\nr = sub, obj, act\n".to_string(),
            policy_rows: rows(&[&["p", "reader", "data", "read"]]),
            role_rows: Vec::new(),
        };

        let err = evaluate(&source, &NaiveCompiler, &EvaluateOptions::new()).unwrap_err();
        match err {
            Error::MissingPolicyDefinition { key } => assert_eq!(key.as_str(), "p"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_permission_field_should_fail_naming_the_field() {
        let err = evaluate(
            &simple_source(),
            &NaiveCompiler,
            &EvaluateOptions::new().permission_fields("verb", "obj"),
        )
        .unwrap_err();

        match err {
            Error::MissingPermissionField { field, key } => {
                assert_eq!(field, "verb");
                assert_eq!(key.as_str(), "p");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

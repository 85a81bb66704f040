use crate::error::{Error, Result};
use crate::expr::{CompiledExpr, ExprKind, ExpressionCompiler};
use crate::types::SectionKey;
use std::collections::HashMap;
use tracing::debug;

/// Parsed model: request/policy/role shapes plus compiled matcher and effect
/// predicates, each keyed by [`SectionKey`].
#[derive(Debug, Default, Clone)]
pub struct Model {
    /// Ordered request field names per key (`r = sub, obj, act`).
    pub request_definition: HashMap<SectionKey, Vec<String>>,
    /// Ordered policy field names per key (`p = sub, obj, act`).
    pub policy_definition: HashMap<SectionKey, Vec<String>>,
    /// Ordered role tuple field names per key (`g = _, _`).
    pub role_definition: HashMap<SectionKey, Vec<String>>,
    /// Compiled policy-effect predicates per key.
    pub policy_effect: HashMap<SectionKey, CompiledExpr>,
    /// Compiled matcher predicates per key.
    pub matchers: HashMap<SectionKey, CompiledExpr>,
}

/// Model parsing options.
#[derive(Debug, Default, Clone)]
pub struct ParseOptions {
    /// Fail on malformed statements instead of dropping them silently.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy)]
enum Section {
    RequestDefinition,
    PolicyDefinition,
    RoleDefinition,
    PolicyEffect,
    Matchers,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "request_definition" => Some(Self::RequestDefinition),
            "policy_definition" => Some(Self::PolicyDefinition),
            "role_definition" => Some(Self::RoleDefinition),
            "policy_effect" => Some(Self::PolicyEffect),
            "matchers" => Some(Self::Matchers),
            _ => None,
        }
    }
}

/// Parses model source text with default (permissive) options.
///
/// Malformed statements are dropped silently; a wholly empty or header-less
/// source yields an empty [`Model`]. Callers relying on specific sections must
/// check for their presence.
pub fn parse_model(source: &str, compiler: &dyn ExpressionCompiler) -> Result<Model> {
    parse_model_with(source, compiler, &ParseOptions::default())
}

/// Parses model source text.
///
/// The source is scanned for `[section_name]` headers followed by `key = value`
/// statements. Unrecognized headers are ignored together with their statements.
/// Definition values are comma-split into ordered field lists; matcher and
/// effect values are handed to the expression compiler and stored compiled.
/// With `strict` set, statements that would otherwise be dropped (missing key
/// or value after trimming, or an invalid key token) fail the parse instead.
pub fn parse_model_with(
    source: &str,
    compiler: &dyn ExpressionCompiler,
    options: &ParseOptions,
) -> Result<Model> {
    let mut model = Model::default();
    let mut section: Option<Section> = None;
    let mut skipped: Vec<String> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            section = Section::from_name(name.trim());
            continue;
        }

        let Some(current) = section else {
            // Content before the first recognized header carries no meaning.
            continue;
        };

        let number = index + 1;
        let Some((token, value)) = line.split_once('=') else {
            skip_line(&mut skipped, number, line);
            continue;
        };
        let token = token.trim();
        let value = value.trim();
        if token.is_empty() || value.is_empty() {
            skip_line(&mut skipped, number, line);
            continue;
        }
        let Ok(key) = SectionKey::new(token) else {
            skip_line(&mut skipped, number, line);
            continue;
        };

        match current {
            Section::RequestDefinition => {
                model.request_definition.insert(key, split_fields(value));
            }
            Section::PolicyDefinition => {
                model.policy_definition.insert(key, split_fields(value));
            }
            Section::RoleDefinition => {
                model.role_definition.insert(key, split_fields(value));
            }
            Section::PolicyEffect => {
                let expr = compiler.compile(value, &key, ExprKind::PolicyEffect)?;
                model.policy_effect.insert(key, expr);
            }
            Section::Matchers => {
                let expr = compiler.compile(value, &key, ExprKind::Matcher)?;
                model.matchers.insert(key, expr);
            }
        }
    }

    if options.strict && !skipped.is_empty() {
        return Err(Error::MalformedModel { lines: skipped });
    }
    Ok(model)
}

fn skip_line(skipped: &mut Vec<String>, number: usize, line: &str) {
    debug!(line = number, text = line, "skipping malformed model line");
    skipped.push(format!("{number}: {line}"));
}

fn split_fields(value: &str) -> Vec<String> {
    value.split(',').map(|field| field.trim().to_string()).collect()
}

//! Declarative policy evaluation with a cached authorization query surface.
//!
//! This crate compiles a small textual model (request/policy/role shapes plus
//! matcher expressions) and tabular policy data into a [`PermissionIndex`],
//! optionally narrowed to one subject, and wraps permission sources behind a
//! synchronous `can(action, object)` query surface. Matching and effect logic
//! is pluggable through the [`ExpressionCompiler`] trait; the default backend
//! treats every expression as true. The default behavior of every query
//! surface is deny-by-default.
//!
//! # Examples
//!
//! Reshaping a policy table into a queryable index:
//! ```
//! use rs_policy::{Authorizer, EvaluateOptions, NaiveCompiler, PolicySource, evaluate};
//!
//! let source = PolicySource {
//!     model: "
//!         [request_definition]
//!         r = sub, obj, act
//!
//!         [policy_definition]
//!         p = sub, obj, act
//!
//!         [matchers]
//!         m = r.obj == p.obj && r.act == p.act
//!     "
//!     .to_string(),
//!     policy_rows: vec![
//!         vec!["p".into(), "reader".into(), "data".into(), "read".into()],
//!         vec!["p".into(), "writer".into(), "data".into(), "write".into()],
//!     ],
//!     role_rows: Vec::new(),
//! };
//!
//! let index = evaluate(&source, &NaiveCompiler, &EvaluateOptions::new()).unwrap();
//! let auth = Authorizer::from_index(index);
//! assert!(auth.can("read", "data"));
//! assert!(auth.can(["read", "write"], "data"));
//! assert!(!auth.can("delete", "data"));
//! ```
//!
//! Caching an asynchronously produced index with local persistence (enable
//! `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_policy::{AsyncAuthorizer, MemoryStorage, PermissionIndex, Result};
//!
//! async fn fetch_permissions() -> Result<PermissionIndex> {
//!     // Fetch or recompute the index here.
//!     Ok(PermissionIndex::new())
//! }
//!
//! let auth = AsyncAuthorizer::new(fetch_permissions).storage(MemoryStorage::new());
//!
//! // Drive `auth.load()` on your executor; `can` answers immediately from the
//! // best available snapshot.
//! assert!(!auth.can("read", "data"));
//! # }
//! ```
#![forbid(unsafe_code)]

mod authorizer;
mod cache;
mod engine;
mod error;
mod expr;
mod model;
mod permission;
mod roles;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::authorizer::{ActionQuery, Authorizer, Query};
pub use crate::cache::AsyncAuthorizer;
pub use crate::engine::{EvaluateOptions, PolicySource, evaluate, evaluate_model};
pub use crate::error::{Error, Result, StorageError};
pub use crate::expr::{
    CompiledExpr, ContextValue, EvalContext, ExprKind, ExpressionCompiler, NaiveCompiler,
};
pub use crate::model::{Model, ParseOptions, parse_model, parse_model_with};
pub use crate::permission::PermissionIndex;
pub use crate::roles::{RolePredicate, RoleRegistry};
pub use crate::store::{NoStorage, Storage};
pub use crate::types::SectionKey;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStorage;

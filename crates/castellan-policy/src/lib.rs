//! Castellan policy primitives shared by the adapters and the authz service.
//!
//! # Purpose
//! Validates declarative model text, defines the rule row shapes, and wraps the
//! Casbin enforcer behind a small matching-engine API.
//!
//! # How it fits
//! Policy stores in `castellan-adapter` persist [`RuleRow`]s; the authz service
//! builds a [`PolicyEngine`] from a [`ModelText`] plus one of those stores and
//! serialises access to it.
//!
//! # Key invariants
//! - Model text must carry request, policy, effect, and matcher sections.
//! - The engine never writes to its store on its own; persistence is an
//!   explicit full replace via [`PolicyEngine::replace_all_rules`].
//!
//! # Examples
//! ```rust
//! use castellan_policy::{ModelText, RuleKind};
//!
//! let text = "[request_definition]\nr = sub, obj, act\n\n[policy_definition]\np = sub, obj, act\n\n[policy_effect]\ne = some(where (p.eft == allow))\n\n[matchers]\nm = r.sub == p.sub && r.obj == p.obj && r.act == p.act\n";
//! let model = ModelText::parse(text).expect("valid model");
//! assert!(!model.has_role_definition());
//! assert_eq!(RuleKind::Grouping.section(), "g");
//! ```
//!
//! # Common pitfalls
//! - Matchers compare with exact equality unless they call a path predicate
//!   such as `keyMatch2`; a `*` in a policy row is only a wildcard when the
//!   matcher says so.

mod engine;
mod errors;
mod model;
mod rule;

pub use engine::{AccessRequest, PolicyEngine};
pub use errors::{PolicyError, PolicyResult};
pub use model::{ModelText, REQUIRED_SECTIONS};
pub use rule::{RuleKind, RuleRow, matches_filter};

//! # fhirgate-proxy
//!
//! The access-decision pipeline: a read-only
//! [`request::RequestReader`] over the inbound HTTP request, the
//! [`graph::GraphResolver`] that walks the upstream FHIR graph for a
//! principal, the [`sync_scope`] rewriter that turns a resolved scope into
//! `_tag` search parameters, the [`checkers`] chain that composes role
//! checks with the rewriter into one [`checkers::AccessDecision`], and the
//! [`audit`] synthesizer that reconstructs BALP audit events after a
//! successful forward.
//!
//! Control flow for one request:
//!
//! ```text
//! RequestReader -> CheckerChain.check
//!   -> deny: 403, no forward, no audit
//!   -> grant: mutate(request) -> forward upstream -> post_process(req, resp) -> audit
//! ```

pub mod audit;
pub mod cache;
pub mod checkers;
pub mod config;
pub mod graph;
pub mod request;
pub mod sync_scope;

pub use audit::AuditSynthesizer;
pub use cache::{GraphResolverCache, LocalGraphResolverCache};
pub use checkers::{AccessChecker, AccessDecision, PermissionChecker};
pub use config::ProxyConfig;
pub use graph::{GraphResolver, PractitionerDetails};
pub use request::{RequestReader, RestOperationType};
pub use sync_scope::SyncScopeRewriter;

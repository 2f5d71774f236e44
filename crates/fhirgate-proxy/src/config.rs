//! Gateway-wide tuning that isn't upstream-connection-specific (that lives
//! in `fhirgate_client::ClientConfig`).

use std::collections::HashMap;
use std::time::Duration;

/// The zero-scope sentinel location identifier. Fixed and
/// unguessable-by-convention, not a cryptographic secret — it only has to
/// never collide with a real `Location` id.
pub const ZERO_SCOPE_SENTINEL: &str = "zzz-no-access-3f1c9b7e-4a2d-4e6a-9c3a-000000000000";

/// Controls whether the sync-tag rewriter emits bare identifiers (the
/// current, upstream-compatible behavior) or `system|code` pairs. The
/// bare-identifier form is a documented workaround around upstreams that
/// don't index qualified tags; this toggle lets an operator switch to the
/// qualified form without a silent behavior change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncTagEncoding {
    #[default]
    BareIdentifier,
    SystemQualified,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// `DEV_MODE`: relax bundle-entry role enforcement to a
    /// logged warning instead of a denial.
    pub dev_mode: bool,
    /// How the sync-scope rewriter encodes `_tag` values.
    pub sync_tag_encoding: SyncTagEncoding,
    /// Additional resource-type -> search-parameter-name entries layered
    /// onto the built-in Patient compartment table.
    pub extra_compartment_params: HashMap<String, Vec<String>>,
    /// TTL for the subject -> practitioner-details cache.
    pub practitioner_cache_ttl: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            sync_tag_encoding: SyncTagEncoding::default(),
            extra_compartment_params: HashMap::new(),
            practitioner_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl ProxyConfig {
    /// Build from the environment, as a deployable binary must. `DEV_MODE`
    /// is the one knob read here; the rest are ambient defaults a runnable
    /// deployment needs regardless.
    pub fn from_env() -> Self {
        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            dev_mode,
            ..Default::default()
        }
    }
}

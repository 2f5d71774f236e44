//! The process-wide singleton container: one HTTP connection pool, one
//! upstream client, one cache, built once at startup and handed to every
//! request worker by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use fhirgate_client::{FhirRestClient, UpstreamFhir};
use fhirgate_core::error::GatewayError;
use fhirgate_proxy::{AccessChecker, AuditSynthesizer, GraphResolverCache, LocalGraphResolverCache, PermissionChecker};

use crate::config::AppConfig;
use crate::forward::ForwardClient;

pub struct AppState {
    pub checker: Arc<dyn AccessChecker>,
    pub cache: Arc<dyn GraphResolverCache>,
    pub audit: AuditSynthesizer,
    pub forward_client: ForwardClient,
    pub fhir_server_base: String,
}

impl AppState {
    pub fn build(config: &AppConfig) -> Result<Self, GatewayError> {
        let upstream: Arc<dyn UpstreamFhir> = Arc::new(FhirRestClient::new(config.client.clone())?);
        let cache: Arc<dyn GraphResolverCache> =
            Arc::new(LocalGraphResolverCache::new(config.proxy.practitioner_cache_ttl));
        let checker: Arc<dyn AccessChecker> = Arc::new(PermissionChecker::new(
            Arc::clone(&upstream),
            Arc::clone(&cache),
            config.proxy.clone(),
        ));
        let audit = AuditSynthesizer::new(config.proxy.extra_compartment_params.clone(), Arc::clone(&upstream));
        let forward_client = ForwardClient::new(&config.client)?;

        Ok(Self {
            checker,
            cache,
            audit,
            forward_client,
            fhir_server_base: config.client.base_url.clone(),
        })
    }

    /// Periodically sweep the subject cache of expired entries.
    pub fn spawn_cache_janitor(state: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = state.cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired practitioner-details cache entries");
                }
            }
        });
    }
}

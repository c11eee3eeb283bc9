#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use caphub::hub::{
    FeatureServiceBinding, FeatureServices, HubError, ProviderDefinition, SharedService,
};

/// Initialize test logging once per test binary
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Provider exposing `"{id}@{version}"` string payloads under each version,
/// in the given declaration order.
pub fn value_provider(id: &str, versions: &[&str]) -> ProviderDefinition {
    let id = id.to_string();
    let versions: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
    ProviderDefinition::new(id.clone(), move |_env| {
        let mut service = SharedService::new();
        for version in &versions {
            let payload = format!("{}@{}", id, version);
            service = service.add_version(version.clone(), move |_uid| {
                FeatureServiceBinding::new(Arc::new(payload.clone()))
            });
        }
        Ok(service)
    })
}

/// Provider exposing a single version with a fixed string payload.
pub fn static_provider(id: &str, version: &str, payload: &str) -> ProviderDefinition {
    let version = version.to_string();
    let payload = payload.to_string();
    ProviderDefinition::new(id, move |_env| {
        let payload = payload.clone();
        Ok(SharedService::new().add_version(version.clone(), move |_uid| {
            FeatureServiceBinding::new(Arc::new(payload.clone()))
        }))
    })
}

/// Provider that counts `create` invocations.
pub fn counting_provider(id: &str, version: &str, counter: Arc<AtomicUsize>) -> ProviderDefinition {
    let version = version.to_string();
    ProviderDefinition::new(id, move |_env| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(SharedService::new().add_version(version.clone(), move |_uid| {
            FeatureServiceBinding::new(Arc::new(String::from("counted")))
        }))
    })
}

/// Provider whose bindings record their teardown into `log`; when `fail` is
/// set, the teardown records its attempt and then errors.
pub fn teardown_provider(
    id: &str,
    version: &str,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
) -> ProviderDefinition {
    let id = id.to_string();
    let version = version.to_string();
    ProviderDefinition::new(id.clone(), move |_env| {
        let id = id.clone();
        let log = log.clone();
        Ok(SharedService::new().add_version(version.clone(), move |uid| {
            let id = id.clone();
            let log = log.clone();
            let uid = uid.to_string();
            FeatureServiceBinding::with_teardown(Arc::new(format!("{}-instance", id)), move || {
                log.lock().unwrap().push(format!("{}:{}", id, uid));
                if fail {
                    Err(HubError::TeardownFailed(format!("{} refused to tear down", id)))
                } else {
                    Ok(())
                }
            })
        }))
    })
}

/// String payload bound under `capability`, if any
pub fn payload(services: &FeatureServices, capability: &str) -> Option<String> {
    services
        .get::<String>(capability)
        .map(|payload| (*payload).clone())
}

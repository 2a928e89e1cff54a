// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detection of the agent's own container from inside it.
//!
//! Ordered attempts: the `HOSTNAME` the daemon injects, the OS hostname,
//! the configured `HOST_NAME`, and finally a label search. The identity
//! struct carries the environment so tests can inject candidates.

use crate::adapters::ContainerDriver;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct SelfIdentity {
    pub hostname_env: Option<String>,
    pub os_hostname: Option<String>,
    pub configured_name: Option<String>,
}

impl SelfIdentity {
    pub fn from_env() -> Self {
        Self {
            hostname_env: crate::env::hostname_env(),
            os_hostname: gethostname::gethostname().into_string().ok(),
            configured_name: Some(crate::env::host_name()),
        }
    }
}

/// Resolve the agent's own container name, or None when every attempt
/// misses (e.g. running straight on the host during development).
pub async fn resolve_self_container(
    driver: &dyn ContainerDriver,
    identity: &SelfIdentity,
) -> Option<String> {
    let candidates = [
        ("HOSTNAME env", identity.hostname_env.as_deref()),
        ("OS hostname", identity.os_hostname.as_deref()),
        ("HOST_NAME env", identity.configured_name.as_deref()),
    ];

    for (source, candidate) in candidates {
        let Some(candidate) = candidate.filter(|c| !c.is_empty()) else { continue };
        match driver.inspect_container(candidate).await {
            Ok(Some(view)) => {
                debug!(container = %view.name, source, "found own container");
                return Some(view.name);
            }
            Ok(None) => debug!(candidate, source, "candidate is not a container"),
            Err(e) => debug!(candidate, source, error = %e, "inspect failed for candidate"),
        }
    }

    match driver.find_container_by_label(crate::env::ORCHESTRATOR_LABEL).await {
        Ok(Some(name)) => {
            debug!(container = %name, "found own container via label");
            Some(name)
        }
        Ok(None) => {
            warn!("could not detect own container using any method");
            None
        }
        Err(e) => {
            debug!(error = %e, "label search failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "self_id_tests.rs"]
mod tests;

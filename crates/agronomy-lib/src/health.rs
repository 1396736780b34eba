//! Component health for the agronomy agent
//!
//! The agent host and the retrain worker report into a shared
//! [`HealthRegistry`]. The HTTP layer turns a snapshot of it into liveness
//! and readiness answers. Running without models is `degraded`, never
//! `unhealthy`: the physics and rule layers still produce decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }

    /// Most severe status in `statuses`, `Healthy` when empty
    pub fn worst(statuses: impl IntoIterator<Item = ComponentStatus>) -> Self {
        statuses
            .into_iter()
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Parts of the agent that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Packet analysis loop
    Engine,
    /// Active model bundle
    Models,
    /// Background retrain worker
    Retrainer,
    /// Training dataset on disk
    Dataset,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Engine,
        Component::Models,
        Component::Retrainer,
        Component::Dataset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Engine => "engine",
            Component::Models => "models",
            Component::Retrainer => "retrainer",
            Component::Dataset => "dataset",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub since: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }
}

/// Active model bundle as seen by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub version: String,
    pub is_bootstrapped: bool,
    pub training_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    model: Option<ModelSummary>,
    initialized: bool,
}

/// Shared, cloneable view of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    /// Empty registry; components appear as they report
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every [`Component`] starting healthy
    pub fn with_components() -> Self {
        let state = RegistryState {
            components: Component::ALL
                .into_iter()
                .map(|c| (c, ComponentHealth::healthy()))
                .collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Record a status; `since` only moves when the status changes
    pub async fn report(
        &self,
        component: Component,
        status: ComponentStatus,
        message: Option<String>,
    ) {
        let mut state = self.state.write().await;
        if let Some(current) = state.components.get_mut(&component) {
            if current.status == status {
                current.message = message;
                return;
            }
        }
        state
            .components
            .insert(component, ComponentHealth::new(status, message));
    }

    pub async fn set_healthy(&self, component: Component) {
        self.report(component, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.report(component, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.report(component, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    pub async fn set_model(&self, model: Option<ModelSummary>) {
        self.state.write().await.model = model;
    }

    /// Engine init finished (or the agent is draining, with `false`)
    pub async fn set_initialized(&self, initialized: bool) {
        self.state.write().await.initialized = initialized;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: ComponentStatus::worst(state.components.values().map(|h| h.status)),
            components: state.components.clone(),
            model: state.model.clone(),
        }
    }

    /// Ready once initialized and while no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if !state.initialized {
            Some("Engine not yet initialized".to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, h)| !h.status.is_operational())
                .map(|(component, h)| match &h.message {
                    Some(message) => format!("{} unhealthy: {}", component, message),
                    None => format!("{} unhealthy", component),
                })
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

// SPDX-License-Identifier: MIT

//! The fixed set of observed condition dimensions, written only by the bulk
//! observer and read by `judge`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three fixed condition keys a workspace is observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKey {
    ContainerReady,
    VolumeReady,
    ArchiveReady,
}

impl ConditionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKey::ContainerReady => "infra.container_ready",
            ConditionKey::VolumeReady => "storage.volume_ready",
            ConditionKey::ArchiveReady => "storage.archive_ready",
        }
    }
}

/// A single named, timestamped true/false assertion about one resource
/// dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStatus {
    pub status: bool,
    /// CamelCase reason, e.g. `ContainerRunning`, `Unreachable`.
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl ConditionStatus {
    pub fn new(status: bool, reason: impl Into<String>, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
        }
    }

    /// Merge a freshly-observed status into the persisted one.
    ///
    /// `last_transition_time` must never regress: if the new observation
    /// keeps the same `status`, the existing timestamp is kept even if the
    /// reason/message text changed (e.g. `Unreachable` persisting across
    /// ticks with a different error message each time).
    pub fn merge(&self, observed_status: bool, reason: impl Into<String>, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        if observed_status == self.status {
            Self {
                status: self.status,
                reason: reason.into(),
                message: message.into(),
                last_transition_time: self.last_transition_time,
            }
        } else {
            Self::new(observed_status, reason, message, now)
        }
    }
}

/// The three condition objects a workspace carries, keyed by the fixed
/// [`ConditionKey`] set. Modeled as a closed struct (not an open map) because
/// the key set never grows without a judge-function change anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Conditions {
    pub container_ready: Option<ConditionStatus>,
    pub volume_ready: Option<ConditionStatus>,
    pub archive_ready: Option<ConditionStatus>,
}

impl Conditions {
    pub fn container_ready(&self) -> bool {
        self.container_ready.as_ref().is_some_and(|c| c.status)
    }

    pub fn volume_ready(&self) -> bool {
        self.volume_ready.as_ref().is_some_and(|c| c.status)
    }

    pub fn archive_ready(&self) -> bool {
        self.archive_ready.as_ref().is_some_and(|c| c.status)
    }

    pub fn has_any_resource(&self) -> bool {
        self.container_ready() || self.volume_ready() || self.archive_ready()
    }
}

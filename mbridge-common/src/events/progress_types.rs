//! Upload progress type definitions
//!
//! Normalized progress messages handed to the embedded editor surface.

use serde::{Deserialize, Serialize};

/// Upload phase as seen by the editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadPhase {
    Uploading,
    Succeeded,
    Failed,
}

impl std::fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadPhase::Uploading => write!(f, "uploading"),
            UploadPhase::Succeeded => write!(f, "succeeded"),
            UploadPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Normalized upload progress for one asset
///
/// Created per upload state transition and forwarded immediately. The
/// consumer keeps only the latest event per `correlation_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Correlation ID of the local asset
    pub correlation_id: i64,
    pub phase: UploadPhase,
    /// Fraction uploaded, 0.0..=1.0
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
}

impl ProgressEvent {
    pub fn uploading(correlation_id: i64, progress: f32, url: Option<String>) -> Self {
        Self {
            correlation_id,
            phase: UploadPhase::Uploading,
            progress,
            url,
            remote_id: None,
        }
    }

    pub fn succeeded(correlation_id: i64, url: String, remote_id: i64) -> Self {
        Self {
            correlation_id,
            phase: UploadPhase::Succeeded,
            progress: 1.0,
            url: Some(url),
            remote_id: Some(remote_id),
        }
    }

    pub fn failed(correlation_id: i64) -> Self {
        Self {
            correlation_id,
            phase: UploadPhase::Failed,
            progress: 0.0,
            url: None,
            remote_id: None,
        }
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AssemblyError, Result},
    narration::wav_duration_seconds,
    types::{AssetSource, NarratedSegment},
};

/// On-disk description of the narrated segments, in playback order.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentManifest {
    pub segments: Vec<ManifestSegment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestSegment {
    pub audio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub image: String,
}

impl SegmentManifest {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_json(&text)
    }

    /// Resolve references against `base_dir` and fill in missing durations from WAV headers.
    pub fn into_segments(self, base_dir: &Path) -> Result<Vec<NarratedSegment>> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for (i, entry) in self.segments.into_iter().enumerate() {
            let audio = resolve_reference(base_dir, &entry.audio);
            let image = resolve_reference(base_dir, &entry.image);

            let duration_seconds = match (entry.duration_seconds, &audio) {
                (Some(d), _) if d.is_finite() && d >= 0.0 => d,
                (Some(d), _) => {
                    return Err(AssemblyError::InvalidManifest {
                        reason: format!("segment {i}: invalid duration_seconds {d}"),
                    });
                }
                (None, AssetSource::File(path)) => {
                    let d = wav_duration_seconds(path)?;
                    debug!(segment = i, duration = d, "duration read from WAV header");
                    d
                }
                (None, _) => {
                    return Err(AssemblyError::InvalidManifest {
                        reason: format!("segment {i}: duration_seconds is required for remote audio"),
                    });
                }
            };

            segments.push(NarratedSegment {
                audio,
                duration_seconds,
                image,
            });
        }
        Ok(segments)
    }
}

/// URLs pass through; relative paths are taken relative to `base_dir`.
pub fn resolve_reference(base_dir: &Path, reference: &str) -> AssetSource {
    match AssetSource::from_reference(reference) {
        AssetSource::File(path) if path.is_relative() => AssetSource::File(base_dir.join(path)),
        other => other,
    }
}

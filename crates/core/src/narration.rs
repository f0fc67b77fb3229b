use std::path::Path;

use crate::error::{AssemblyError, Result};

/// Playback length of a WAV file, read from its header.
pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| AssemblyError::InvalidManifest {
        reason: format!("cannot read WAV header of {}: {e}", path.display()),
    })?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AssemblyError::InvalidManifest {
            reason: format!("{} declares a sample rate of 0", path.display()),
        });
    }

    // `duration()` counts frames, not samples
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

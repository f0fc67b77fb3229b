use std::{fmt, path::PathBuf};

/// Where the bytes of an asset come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetSource {
    Url(String),
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl AssetSource {
    /// Interpret a manifest reference: `http(s)://` is a URL, anything else a path.
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            AssetSource::Url(reference.to_string())
        } else {
            AssetSource::File(PathBuf::from(reference))
        }
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::Url(url) => write!(f, "{url}"),
            AssetSource::File(path) => write!(f, "{}", path.display()),
            AssetSource::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// One narrated unit: audio, its duration and the image shown while it plays.
#[derive(Clone, Debug)]
pub struct NarratedSegment {
    pub audio: AssetSource,
    pub duration_seconds: f64,
    pub image: AssetSource,
}

#[derive(Clone, Debug)]
pub struct AssemblyRequest {
    pub background: AssetSource,
    pub segments: Vec<NarratedSegment>,
}

#[derive(Clone, Debug)]
pub struct FinishedVideo {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub duration_seconds: f64,
    pub batch_count: usize,
    /// Narration durations reported by the encoder while stitching audio.
    pub probed_durations: Vec<f64>,
}

use std::path::PathBuf;

use crate::store::get_root_work_dir;

/// Environment variable overriding the encoder binary.
pub const FFMPEG_ENV_VAR: &str = "THREADREEL_FFMPEG";

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_PRESET: &str = "ultrafast";

/// Output frame size of the normalized background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
        }
    }
}

impl OutputGeometry {
    /// Reduced aspect ratio as `(num, den)`, e.g. `(9, 16)` for 720x1280.
    pub fn aspect(&self) -> (u32, u32) {
        let g = gcd(self.width.max(1), self.height.max(1));
        (self.width.max(1) / g, self.height.max(1) / g)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub program: PathBuf,
    pub preset: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            preset: DEFAULT_PRESET.to_string(),
        }
    }
}

impl EncoderSettings {
    /// Defaults with the program taken from `THREADREEL_FFMPEG` when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(program) = std::env::var(FFMPEG_ENV_VAR)
            && !program.trim().is_empty()
        {
            settings.program = PathBuf::from(program);
        }
        settings
    }
}

#[derive(Clone, Debug)]
pub struct AssemblyConfig {
    pub batch_size: usize,
    pub geometry: OutputGeometry,
    pub encoder: EncoderSettings,
    /// Parent directory of per-run asset directories.
    pub work_root: PathBuf,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            geometry: OutputGeometry::default(),
            encoder: EncoderSettings::default(),
            work_root: get_root_work_dir(),
        }
    }
}

impl AssemblyConfig {
    pub fn from_env() -> Self {
        Self {
            encoder: EncoderSettings::from_env(),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }
}

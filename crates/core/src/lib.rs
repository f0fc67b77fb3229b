pub mod assembler;
pub mod batch;
pub mod config;
pub mod encoder;
pub mod error;
pub mod filter_graph;
pub mod format;
pub mod manifest;
pub mod narration;
pub mod progress;
pub mod store;
pub mod timeline;
pub mod types;

pub use assembler::{Assembler, OUTPUT_MIME};
pub use batch::{Batch, schedule_batches};
pub use config::{AssemblyConfig, EncoderSettings, OutputGeometry};
pub use encoder::{Encoder, EncoderObserver, ExclusiveEncoder, FfmpegEncoder, NoopObserver};
pub use error::{AssemblyError, Result};
pub use filter_graph::EncodeJob;
pub use format::format_seconds;
pub use manifest::{ManifestSegment, SegmentManifest};
pub use narration::wav_duration_seconds;
pub use progress::{ProgressMonitor, ProgressUpdate, StatusBoard};
pub use store::{AssetStore, get_root_work_dir};
pub use timeline::Timeline;
pub use types::{AssemblyRequest, AssetSource, FinishedVideo, NarratedSegment};

//! Shot-boundary detection: scores frame pairs with one or more pluggable
//! detectors, fuses their votes, and segments the result into ordered,
//! disjoint shots.
//!
//! The pipeline is a chain of independently testable stages — frame
//! source, detector, post-processor, fusion engine, segmenter, cache,
//! orchestrator — matching the module layout under `src/`.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame_source;
pub mod fusion;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod postprocess;
pub mod segment;
pub mod wire;

pub use cache::VideoFingerprint;
pub use config::{CoreConfig, DetectorConfig, DetectorKind, DetectorSpec};
pub use error::{CoreError, CoreResult};
pub use model::{Boundary, BoundaryKind, DetectionResult, Segment, VideoMetadata};
pub use orchestrator::Orchestrator;

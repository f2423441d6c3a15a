//! Streaming analysis: cache, classification, trend watching, anomaly
//! context capture, and the per-measurement engine that orchestrates them.

pub mod cache;
pub mod classifier;
pub mod context;
pub mod engine;
pub mod publish;
pub mod trend;

pub use cache::MeasurementCache;
pub use classifier::{classify, Classification};
pub use context::{AnomalyEvent, ContextRecorder};
pub use engine::{AnalysisEngine, EngineStats, EnrichedMeasurement};
pub use publish::{ChannelPublisher, JsonLinePublisher, ResultPublisher};
pub use trend::{watch_trends, TrendDirection, TrendWarning};

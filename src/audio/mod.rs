//! Audio decode, conditioning, and rendering

pub mod decode;
pub mod graph;
pub mod host;
pub mod output;
pub mod resample;
pub mod resolver;
pub mod timepitch;
pub mod types;

pub use graph::{AudioGraph, SegmentComplete};
pub use host::{ManualDriver, ManualHost, ManualHostFactory, RenderHost, RenderHostFactory};
pub use output::{CpalHost, CpalHostFactory};
pub use resolver::{MediaResolver, SymphoniaResolver};
pub use types::Pcm;

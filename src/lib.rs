pub mod core;
pub mod record;
pub mod cache;
pub mod ready;
pub mod spaces;
pub mod rng;
pub mod env;
pub mod policy;
pub mod buffer;
pub mod stats;
pub mod collector;

pub use crate::core::{CollectError, Info, InfoValue, RecordError, RenderFrame, Result};
pub use crate::record::{Column, Hidden, Kind, Record, Value, TRANSITION_KEYS};
pub use crate::cache::EpisodeCache;
pub use crate::ready::ReadySet;
pub use crate::spaces::ActionSpace;
pub use crate::rng::{RngStream, SeedSequence, split_n};
pub use crate::env::{Env, EnvStep, SyncVectorEnv, VectorEnv, VectorStep};
pub use crate::policy::{ActionNoise, Policy, PolicyOutput};
pub use crate::buffer::{MemoryBuffer, ReplayBuffer};
pub use crate::stats::{CollectStats, RewardMetric};
pub use crate::collector::{
    CollectOptions, CollectTarget, Collector, CollectorOptions, PreprocessFn,
};

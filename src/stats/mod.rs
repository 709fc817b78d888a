//! # Incremental statistics
//!
//! Streaming weighted moments and cache-based quantiles. Every other stage of
//! the estimation pipeline is built on [`StreamAccumulator`].
pub(crate) mod quantile;
pub mod stream_accumulator;

pub use stream_accumulator::{CacheMode, StreamAccumulator};

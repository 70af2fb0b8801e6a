//! Network access for fetching missing media.

mod client;

pub use client::{HttpMediaSource, MediaSource};

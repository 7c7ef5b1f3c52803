//! Reddit adapter for the [`safepost_core::PlatformClient`] port.

pub mod client;
pub mod listing;

pub use client::{RedditClient, RedditCredentials, RedditEndpoints};

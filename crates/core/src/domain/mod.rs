pub mod activity;
pub mod content;
pub mod generation;
pub mod identity;

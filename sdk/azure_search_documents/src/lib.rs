#![doc = include_str!("../README.md")]

pub mod client;
pub mod models;
pub mod policy;
pub mod version;

pub use client::{SearchClient, SearchClientBuilder};
pub use version::SearchServiceVersion;

#![doc = include_str!("../README.md")]

pub mod client;
pub mod models;
pub mod version;

pub use client::{BlockingFormRecognizerClient, FormRecognizerClient, FormRecognizerClientBuilder};
pub use version::FormRecognizerVersion;

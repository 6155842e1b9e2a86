#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod paging;
pub mod pipeline;
pub mod policies;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{ServiceError, ServiceResult};

//! Object store implementations.
//!
//! The [`backend::ObjectStore`] trait abstracts over where objects live.
//! Implementations include an AWS S3 (or S3-compatible) store and an
//! in-memory store for development and tests.

pub mod aws;
pub mod backend;
pub mod memory;

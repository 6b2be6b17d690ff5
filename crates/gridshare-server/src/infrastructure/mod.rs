//! Infrastructure layer for the gridshare server.
//!
//! Contains the OS-facing pieces: the platform capability contract and its
//! back ends, the service lifecycle host, settings storage, and the logging
//! routing layer used until a network transport is attached.
//!
//! The `platform` contract types are shared with the application layer,
//! which is written against the traits only.

pub mod platform;
pub mod routing;
pub mod service;
pub mod storage;

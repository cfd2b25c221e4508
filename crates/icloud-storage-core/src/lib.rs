//! iCloud Storage Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `FileEntry`, `IndexRecord`, `ChannelEvent`, `StorageError`
//! - **Port definitions** - Traits for adapters: `ISyncIndex`, `IContainerResolver`,
//!   `IFileCoordinator`
//! - **Configuration** - YAML-backed settings, including the upload stall fallback
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O. Ports define the
//! trait interfaces that the sync engine consumes and adapter code implements.

pub mod config;
pub mod domain;
pub mod ports;

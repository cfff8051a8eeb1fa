//! Job-board backend core: entity lifecycle, referential-integrity-preserving
//! deletion, and bounded retention.
//!
//! The relational store auto-cascades nothing, so every deletion path is a
//! manually ordered protocol (see `lifecycle::deletion`); uploaded binaries
//! live in a blob store with no transactional link to the relational side and
//! are reconciled by the retention sweeper's orphan scan.

pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod storage;
pub mod telemetry;

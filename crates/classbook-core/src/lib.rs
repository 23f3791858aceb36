//! Classbook Core Library
//!
//! This crate provides the local persistence layer for a school
//! administration application: a path-addressed JSON document store with
//! schema migrations and a typed domain layer on top.
//!
//! # Architecture
//!
//! - **Store**: one in-memory document tree, persisted in full on every
//!   mutation (or once per batch)
//! - **TreeAccess**: path-addressed reads and writes that every higher layer
//!   goes through
//! - **Migrations**: idempotent routines that move old tree layouts to the
//!   current one
//! - **School**: domain helpers built on path conventions only
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Store::open(&config)?;
//! Migrator::new(&store).run_startup()?;
//!
//! let mut school = School::new(&store);
//! school.add_student("u1", "Jane", "jane@example.com")?;
//! school.enroll("u1", "2025_2026", Semester::Winter, "math")?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `access`: The `TreeAccess` accessor trait
//! - `document`: Tree traversal and mutation primitives
//! - `path`: Path parsing and joining
//! - `schema`: Tree layout and path builders
//! - `storage`: Backends and storage errors
//! - `migrations`: Schema migrations
//! - `models`: Domain records
//! - `school`: Domain operations
//! - `config`: Application configuration

pub mod access;
pub mod config;
pub mod document;
pub mod migrations;
pub mod models;
pub mod path;
pub mod schema;
pub mod school;
pub mod storage;
pub mod store;

pub use access::TreeAccess;
pub use config::Config;
pub use document::{Object, PathConflictPolicy, Scalar};
pub use migrations::{MigrationError, MigrationReport, Migrator, ScopeChange};
pub use models::{
    AttendanceEntry, ConsultationBooking, DayOff, Mark, ModelError, Semester, SemesterScope,
    Student, Subject, Teacher, YearKey,
};
pub use school::{Bucket, School, SchoolError};
pub use storage::{FileBackend, MemoryBackend, StorageBackend, StoreError, StoreResult};
pub use store::{Batch, LoadOutcome, Store, StoreOptions};

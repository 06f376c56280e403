//! # Forgery Test
//!
//! Testing utilities for code built on Forgery fixtures.
//!
//! - [`RecordingAdapter`]: adapter that records and counts every call
//! - [`init_test_logging`]: one-time `tracing` subscriber for tests
//! - rstest fixtures in [`fixtures`] providing fresh orchestrators
//!
//! ```rust,ignore
//! use forgery_test::fixtures::recorded_orchestrator;
//! use rstest::rstest;
//!
//! #[rstest]
//! #[tokio::test]
//! async fn test_create_saves(recorded_orchestrator: (Orchestrator, RecordingAdapter)) {
//!     let (orchestrator, adapter) = recorded_orchestrator;
//!     orchestrator.fixture("user", "User", FixtureOptions::new(), |_| Ok(())).unwrap();
//!
//!     orchestrator.create("user", ()).await.unwrap();
//!
//!     assert_eq!(adapter.save_count().await, 1);
//! }
//! ```

#![warn(missing_docs)]

pub mod fixtures;
pub mod logging;
pub mod mock;

pub use logging::init_test_logging;
pub use mock::{AdapterCall, AdapterOperation, RecordingAdapter};

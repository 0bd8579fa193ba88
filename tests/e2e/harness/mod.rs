//! E2E test harness for gitstore.

#![allow(dead_code)]

pub mod workspace;

pub use workspace::TestWorkspace;

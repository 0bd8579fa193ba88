//! End-to-end scenarios for gitstore.

mod harness;
mod scenarios;

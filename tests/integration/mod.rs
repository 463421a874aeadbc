//! Integration test modules.

mod pipeline_test;
mod replay_test;

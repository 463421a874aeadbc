//! Unit test modules.

mod pipeline_props_test;
mod statistics_test;

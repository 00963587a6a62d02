pub mod common;
mod opportunity_tests;

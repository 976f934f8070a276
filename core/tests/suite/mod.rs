//! Integration test suite modules

mod capability;
mod lifecycle;

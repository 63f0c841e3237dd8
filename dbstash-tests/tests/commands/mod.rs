//! Command tests
//!
//! Drive the pipelines and the run orchestration against shell-script
//! stand-ins for the dump tools and rclone.

#![cfg(unix)]

mod orchestration;
mod pipeline;
mod scheduling;

//! Utilities Module
//!
//! This module contains shared utility functionality for the zcmd daemon.

pub mod signals;
pub mod tracing;

//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the crate.
//! In particular, it exposes a generational [`Slab`] used by the local
//! bus to hand out subscription handles.

mod slab;

pub(crate) use slab::{Key, Slab};

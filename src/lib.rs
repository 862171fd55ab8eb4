//! Root crate of the link workspace.
//!
//! This crate carries no runtime code of its own; it exists so the
//! top-level `tests/integration/` suite has a package to live under,
//! matching the other workspace members it exercises together:
//! [`link_wire`], [`link_core`], [`link_transport`], and
//! [`link_test_support`].

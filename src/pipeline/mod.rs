//! Analysis stages for meeting notes.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others and the completion backend can be swapped without
//! touching parsing.
//!
//! ## Data Flow
//!
//! ```text
//! prompt ──▶ completion ──▶ parse ──▶ roster
//! (notes)    (LLM text)     (typed)   (assignee spelling)
//! ```
//!
//! 1. [`completion`] — the only stage with network I/O; retry and timeout
//!    live here
//! 2. [`parse`]      — fence stripping, JSON validation, case-insensitive
//!    typed mapping, normalisation; never fails
//! 3. [`roster`]     — best-effort alignment of assignees to attendee names

pub mod completion;
pub mod parse;
pub mod roster;

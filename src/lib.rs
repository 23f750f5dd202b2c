//! Reflective ticket recommendation engine.
//!
//! Free-text travel requests are turned into structured [`Needs`], candidate tickets are
//! scored and ranked, the resulting recommendation set is judged on several quality axes, and
//! the search parameters are refined until the judgment clears a threshold or the iteration
//! budget runs out.
//!
//! [`Needs`]: workflows::recommendation::Needs

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

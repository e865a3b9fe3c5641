//! Core pipeline for the czar toolchain.
//!
//! czar turns a tree of `.cz` sources into a linked C program. The
//! pipeline is roughly:
//!
//!   source .cz
//!     -> directive   (drop `#pragma czar` lines)
//!     -> toolchain   (optional external transpiler)
//!     -> extract     (function definitions, via lexer)
//!     -> header      (one generated .h per unit)
//!     -> import + sibling  (once every header exists)
//!     -> toolchain   (compile each unit, link once)
//!
//! The CLI should depend on this crate rather than reimplementing the
//! pipeline.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod error;
pub mod config;

// ---------------------------------------------------------------------
// Text stages
// ---------------------------------------------------------------------

pub mod directive;
pub mod lexer;
pub mod extract;
pub mod header;
pub mod import;
pub mod sibling;

// ---------------------------------------------------------------------
// Units, artifacts and orchestration
// ---------------------------------------------------------------------

pub mod unit;
pub mod artifact;
pub mod toolchain;
pub mod build;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use build::{BuildGraph, BuildMode, BuildReport, Builder, build, clean};
pub use config::BuildConfig;
pub use error::{CzarError, Stage};
pub use unit::{Declaration, ImportDirective, TranslationUnit};

//! Job expander: test entries -> build/run job descriptors.
//!
//! Leaves first:
//! - pm:       package-manager directives and their command text
//! - deps:     depends_on qualification
//! - variant:  variant flag composition
//! - lang:     source language detection
//! - expand:   the job matrix itself

pub mod compiler;
pub mod deps;
pub mod expand;
pub mod lang;
pub mod pm;
pub mod variant;

pub use compiler::CompilerDescriptor;
pub use expand::{JobDescriptor, expand_suite};

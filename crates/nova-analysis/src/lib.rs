//! Data model for incremental compilation.
//!
//! A build records a [`BuildMetadata`] (stamps, APIs and relations per source)
//! together with the [`BuildSetup`] it was produced under. The next build uses
//! both to decide what it can reuse:
//! - [`Stamps`] detect sources, products and binaries that changed on disk
//! - [`Apis`] detect signature changes that must propagate to dependents
//! - [`Relations`] record the dependency edges that propagation follows
//!
//! Persistence lives in `nova-analysis-store`; orchestration in `nova-incremental`.

mod api;
mod metadata;
mod relations;
mod setup;
mod stamp;

pub use api::{ApiFingerprint, Apis};
pub use metadata::BuildMetadata;
pub use relations::{Relation, Relations};
pub use setup::{option_units, BuildSetup, CompileOptions, CompileOrder};
pub use stamp::{Stamp, Stamps};

//! DOM forest for captured pages
//!
//! A read-only view of the markup a page ended up with, as captured by the
//! host browser. Iframes make it a forest: each nested document is a
//! separate tree, reachable only through its iframe element.
//!
//! ## Core Design
//!
//! ```text
//! Snapshot JSON → DomService → DomArena (owned) → traverse_df / visitor
//!                                  ↓
//!                    NodeId (u32), DocumentId (u32)
//! ```

pub mod arena;
pub mod error;
pub mod service;
pub mod types;
pub mod utils;
pub mod visitor;

pub use arena::DomArena;
pub use error::{DomError, Result};
pub use service::{DomService, DomServiceConfig};
pub use types::*;
pub use visitor::DomElementVisitor;

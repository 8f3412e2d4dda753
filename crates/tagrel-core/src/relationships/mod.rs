//! Pure resolution of user-declared tag relationships.
//!
//! - [`siblings`]: alias chains collapsed to a single ideal tag
//! - [`parents`]: implied tags expanded to full ancestor lists
//!
//! Both resolvers are total: contradictory or cyclic input is trimmed pair by
//! pair and never reported as an error.

pub mod parents;
pub mod siblings;

pub use parents::{
    build_direct_parents, expand_transitively, resolve_parents, would_loop, DirectParents,
    ParentGraph,
};
pub use siblings::{resolve_siblings, SiblingGraph};

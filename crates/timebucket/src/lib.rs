//! Top-level facade crate for timebucket.
//!
//! Re-exports the identity model and the repository runtime so users can depend on a single crate.

pub mod core {
    pub use timebucket_core::*;
}

pub mod repo {
    pub use timebucket_repo::*;
}

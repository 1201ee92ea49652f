//! Domain logic - pure version rules independent of any storage backend

pub mod bump;
pub mod prerelease;
pub mod version;

pub use bump::Bump;
pub use prerelease::Identifier;
pub use version::SemanticVersion;

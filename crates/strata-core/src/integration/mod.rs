//! Integration layer: contracts for the resolver's external collaborators.
//!
//! | Collaborator | Trait | In-memory implementation |
//! |--------------|-------|--------------------------|
//! | Remote baseline source | [`RemoteSource`](source::RemoteSource) | [`StaticRemoteSource`](source::StaticRemoteSource) |
//! | Persistent override store | [`OverrideStore`](store::OverrideStore) | [`MemoryOverrideStore`](store::MemoryOverrideStore) |
//! | Override document transport | [`OverrideTransport`](fetch::OverrideTransport) | [`MemoryTransport`](fetch::MemoryTransport) |
//!
//! The in-memory implementations are full implementations of their
//! contracts; they back the test suites and embedders that keep everything
//! in process.

pub mod fetch;
pub mod source;
pub mod store;

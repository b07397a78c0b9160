//!  Storage is organized around [kv::KeyValueStore].
//!  The basic idea is:
//!   - There are three top-level records, see [kv::StoreKey].
//!   - Records are typed through [kv::Record] and decoded from a snapshot taken at some revision.
//!   - Writers compare-and-set against that revision, so concurrent writers never overwrite each
//!     other. [file_store::JsonFileStore] keeps everything in one json document shared between
//!     processes.

pub mod entities;
pub mod file_store;
pub mod kv;
pub mod memory;

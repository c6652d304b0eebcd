//! Remote store implementations for Sensorvault.
//!
//! - [`directory`] - archive directory on a local or mounted filesystem
//!
//! # Design Pattern
//!
//! Adapters implement [`RemoteDataStore`](crate::store::RemoteDataStore) so a
//! local store never depends on where its data ends up. Tests substitute
//! in-memory implementations of the same trait.
//!
//! ```rust,no_run
//! use sensorvault::adapters::directory::DirectoryRemoteStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = DirectoryRemoteStore::new(std::path::Path::new("/var/lib/sensorvault/archive"))?;
//! println!("{} artifacts archived", remote.artifacts()?.len());
//! # Ok(())
//! # }
//! ```

pub mod directory;

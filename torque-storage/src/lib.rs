//! Image storage collaborator for maintenance orders.
//!
//! Order creation may carry a base64 photo of the maintenance work. The
//! [`ImageStore`] capability uploads it and hands back a public URL that is
//! persisted on the order. Two implementations exist: a simulated store
//! that keeps objects in memory and never touches the network, and an
//! S3-compatible store built on `object_store`. The backend is selected
//! once at startup from configuration.

pub mod error;
pub mod image;

pub use error::{StorageError, StorageResult};
pub use image::{
    image_store_from_settings, ImageStore, S3ImageStore, SimulatedImageStore, StorageSettings,
};

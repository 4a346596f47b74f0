pub mod blobs;
pub mod prep;

pub use blobs::find_blobs;

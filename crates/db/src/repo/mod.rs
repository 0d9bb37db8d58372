pub mod blobs;
pub mod settings;

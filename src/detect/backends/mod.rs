mod blob;
mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use blob::BlobBackend;
pub use stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

pub mod memory;
pub mod s3;
pub mod sigv4;

pub use memory::MemoryObjectStore;
pub use s3::S3Client;
pub use sigv4::Credentials;

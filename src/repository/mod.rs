// Stage repository backends
// The engine only sees the StageRepository trait; these are the bundled implementations.

pub mod errors;
pub mod file_store;
pub mod memory;

pub use errors::RepositoryError;
pub use file_store::FileStageRepository;
pub use memory::InMemoryStageRepository;

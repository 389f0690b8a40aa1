mod mapping_repo;
#[cfg(test)]
mod mock;
mod repo_error;

pub use mapping_repo::*;
#[cfg(test)]
pub use mock::MockMappingRepository;
pub use repo_error::RepositoryError;

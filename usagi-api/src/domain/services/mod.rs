mod mapping;

pub use mapping::{MappingService, MappingServiceError, MappingSettings};

pub(crate) mod error;
pub(crate) mod info;
pub(crate) mod mapping;
pub(crate) mod search;
pub(crate) mod vocabulary;

pub(crate) use error::ApiError;

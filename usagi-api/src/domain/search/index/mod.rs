//! Index client implementations.

#[cfg(test)]
mod mock;
mod solr;

#[cfg(test)]
pub use mock::MockIndexClient;
pub use self::solr::SolrIndexClient;

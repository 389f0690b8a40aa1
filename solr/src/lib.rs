mod client;
mod query;
mod solr_url;

pub(crate) use solr_url::*;

pub use client::*;
pub use query::*;

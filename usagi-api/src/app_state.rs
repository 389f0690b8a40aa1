use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::search::SolrIndexClient;
use crate::domain::services::{MappingService, MappingSettings};
use crate::repositories::MappingRepositoryImpl;

pub type UsagiService = MappingService<SolrIndexClient, MappingRepositoryImpl>;

#[derive(Clone)]
pub struct AppState {
    mapping_service: Arc<UsagiService>,
}

impl AppState {
    pub fn new(db_pool: PgPool, index: SolrIndexClient, settings: MappingSettings) -> Self {
        let repository = MappingRepositoryImpl::new(db_pool);

        Self {
            mapping_service: Arc::new(MappingService::new(index, repository, settings)),
        }
    }

    pub fn mapping_service(&self) -> &UsagiService {
        &self.mapping_service
    }
}

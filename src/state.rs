use std::sync::Arc;

use crate::{
    auth::jwt::JwtService, config::AppConfig, guest::GuestStore, persistence::Persistence,
    pricing::PricingOptions, storage::ObjectStorage, store::RecordStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub persistence: Persistence,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        let pricing = PricingOptions {
            clamp_negative: config.clamp_negative_totals,
        };
        let guests = Arc::new(GuestStore::with_limits(config.guest_limits()));
        let persistence = Persistence::new(records, guests, storage, pricing);
        Self {
            config: Arc::new(config),
            persistence,
            jwt,
        }
    }
}

//! Service wiring: pick the store, build collaborators, hand everything to
//! the router as one shared bundle.

use std::sync::Arc;

use assetkeep_ai::{DisabledAnalyzer, GeminiConfig, GeminiImageAnalyzer, ImageAnalyzer};
use assetkeep_auth::JwtIssuer;
use assetkeep_infra::config::AppConfig;
use assetkeep_infra::db::{self, PoolSettings};
use assetkeep_infra::external::{DisabledGateway, PayPalGateway, PaymentGateway};
use assetkeep_infra::services::{
    AccountService, AdminService, AnalysisService, BillingService, CategoryService, DashboardService, ItemService,
    LendingService, LocationService,
};
use assetkeep_infra::{InMemoryStore, InventoryStore, PgStore, StoreError};

/// Everything a handler may need. Cheap to clone; every service shares the
/// same store.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
    pub accounts: AccountService,
    pub locations: LocationService,
    pub items: ItemService,
    pub categories: CategoryService,
    pub lending: LendingService,
    pub dashboard: DashboardService,
    pub admin: AdminService,
    pub analysis: AnalysisService,
    pub billing: BillingService,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        issuer: JwtIssuer,
        analyzer: Arc<dyn ImageAnalyzer>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), Arc::new(issuer)),
            locations: LocationService::new(store.clone()),
            items: ItemService::new(store.clone()),
            categories: CategoryService::new(store.clone()),
            lending: LendingService::new(store.clone()),
            dashboard: DashboardService::new(store.clone()),
            admin: AdminService::new(store.clone()),
            analysis: AnalysisService::new(analyzer),
            billing: BillingService::new(store.clone(), gateway),
            store,
        }
    }

    /// In-memory store with both collaborators disabled.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            JwtIssuer::new(jwt_secret, chrono::Duration::days(7)),
            Arc::new(DisabledAnalyzer),
            Arc::new(DisabledGateway),
        )
    }
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn InventoryStore>, StoreError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
        return Ok(Arc::new(InMemoryStore::new()));
    };
    let settings = PoolSettings {
        max_connections: config.db_max_connections,
        connect_timeout: config.db_connect_timeout,
    };
    let pool = db::connect(url, &settings).await?;
    db::apply_schema(&pool).await?;
    tracing::info!(max_connections = settings.max_connections, "database connection established");
    Ok(Arc::new(PgStore::new(pool)))
}

fn build_analyzer(config: &AppConfig) -> Arc<dyn ImageAnalyzer> {
    let Some(settings) = &config.gemini else {
        tracing::info!("GEMINI_API_KEY not set; image analysis returns placeholders");
        return Arc::new(DisabledAnalyzer);
    };
    let mut ai = GeminiConfig::new(settings.api_key.clone());
    ai.model = settings.model.clone();
    ai.timeout = settings.timeout;
    match GeminiImageAnalyzer::new(ai) {
        Ok(analyzer) => Arc::new(analyzer),
        Err(e) => {
            tracing::error!(error = %e, "failed to create image analyzer; falling back to placeholders");
            Arc::new(DisabledAnalyzer)
        }
    }
}

fn build_gateway(config: &AppConfig) -> Arc<dyn PaymentGateway> {
    let Some(settings) = &config.paypal else {
        tracing::info!("PayPal credentials not set; billing capture is disabled");
        return Arc::new(DisabledGateway);
    };
    let live = config.env.is_production();
    match PayPalGateway::new(settings.client_id.clone(), settings.client_secret.clone(), live) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            tracing::error!(error = %e, "failed to create payment gateway; billing capture is disabled");
            Arc::new(DisabledGateway)
        }
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let store = build_store(config).await?;
    Ok(AppServices::new(
        store,
        JwtIssuer::new(&config.jwt_secret, config.jwt_ttl()),
        build_analyzer(config),
        build_gateway(config),
    ))
}

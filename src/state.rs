use std::sync::Arc;

use handlebars::Handlebars;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::storage::{LocalStorage, StorageClient};
use crate::{db, templates};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub templates: Arc<Handlebars<'static>>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config.database_url).await?;
        let storage = Arc::new(LocalStorage::new(&config.upload_dir).await?) as Arc<dyn StorageClient>;
        let templates = Arc::new(templates::create_templates()?);

        Ok(Self {
            db,
            config: Arc::new(config),
            storage,
            templates,
        })
    }

    /// Fresh database and upload directory under the system temp dir.
    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::config::SessionConfig;

        let root = std::env::temp_dir().join(format!("attendance-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("create scratch dir");

        let config = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", root.join("attendance.db").display()),
            upload_dir: root.join("uploads"),
            session: SessionConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                cookie_secure: false,
            },
        };
        Self::init(config).await.expect("init test state")
    }
}

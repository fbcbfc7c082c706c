use std::sync::Arc;

use tracing::warn;

use crate::ai::{GeminiClient, TextGenerator};
use crate::config::AppConfig;
use crate::db::Database;
use crate::mail::{LogMailer, Mailer, SmtpMailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub ai: Arc<dyn TextGenerator>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        // Fatal after the configured attempts: nothing can be served without a database.
        let db = Database::connect(config.db.clone()).await?;

        let ai = Arc::new(GeminiClient::new(&config.gemini)?) as Arc<dyn TextGenerator>;

        let mailer = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>,
            None => {
                warn!("SMTP_HOST not set; password reset emails will only be logged");
                Arc::new(LogMailer) as Arc<dyn Mailer>
            }
        };

        Ok(Self::from_parts(db, config, ai, mailer))
    }

    pub fn from_parts(
        db: Database,
        config: Arc<AppConfig>,
        ai: Arc<dyn TextGenerator>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            config,
            ai,
            mailer,
        }
    }
}

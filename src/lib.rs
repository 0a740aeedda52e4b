pub mod api;
pub mod config;
pub mod db;
pub mod mailer;

pub use db::DbPool;

use api::tokens::Tokens;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: Tokens,
    pub mailer: mailer::Mailer,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let tokens = Tokens::new(&config.auth);
        let mailer = mailer::Mailer::new(config.email.clone());
        Self {
            config,
            db,
            tokens,
            mailer,
        }
    }
}

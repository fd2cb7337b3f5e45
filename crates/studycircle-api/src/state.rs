use std::sync::Arc;

use studycircle_db::Database;
use studycircle_gateway::dispatcher::Dispatcher;

use crate::suggestions::SuggestionClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub suggestions: SuggestionClient,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, suggestions: SuggestionClient) -> AppState {
        Arc::new(Self {
            db: Arc::new(db),
            jwt_secret,
            dispatcher: Dispatcher::new(),
            suggestions,
        })
    }
}

#![allow(dead_code)]

use uuid::Uuid;

use studycircle_api::state::{AppState, AppStateInner};
use studycircle_api::suggestions::{SuggestionClient, SuggestionConfig};
use studycircle_db::Database;
use studycircle_rules::policy::Actor;

pub const JWT_SECRET: &str = "test-secret";

pub fn state() -> AppState {
    let db = Database::open_in_memory().unwrap();
    let suggestions = SuggestionClient::new(SuggestionConfig::default()).unwrap();
    AppStateInner::new(db, JWT_SECRET.to_string(), suggestions)
}

/// Insert a user with a placeholder hash; returns their actor.
pub fn student(state: &AppState, name: &str) -> Actor {
    let id = Uuid::new_v4();
    let email = format!("{}@school.edu", name.to_lowercase());
    state.db.create_user_with_profile(id, &email, "hash", name).unwrap();
    Actor::User(id)
}

pub fn id_of(actor: Actor) -> Uuid {
    actor.user_id().unwrap()
}

pub fn badge_names(state: &AppState, actor: Actor) -> Vec<String> {
    state
        .db
        .earned_badges(id_of(actor))
        .unwrap()
        .into_iter()
        .map(|ub| ub.badge.name)
        .collect()
}

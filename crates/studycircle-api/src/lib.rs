pub mod access;
pub mod answers;
pub mod auth;
pub mod badges;
pub mod chat;
pub mod error;
pub mod groups;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod questions;
pub mod resources;
pub mod router;
pub mod state;
pub mod subjects;
pub mod suggestions;

//! Business rules for StudyCircle: who may touch which row, when badges and
//! points are awarded, and which notifications a domain event produces.

pub mod acceptance;
pub mod gamification;
pub mod notify;
pub mod policy;
pub mod validate;

//! API routes

pub mod badges;
pub mod events;
pub mod health;
pub mod karma;
pub mod users;

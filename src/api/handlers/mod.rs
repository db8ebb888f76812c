pub mod auth;
pub mod community;
pub mod health;
pub mod pairs;
pub mod projects;
pub mod shares;

pub mod auth;
pub mod health;
pub mod ingredients;
pub mod media;
pub mod recipes;
pub mod tags;
pub mod users;

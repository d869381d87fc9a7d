pub mod account;
pub mod auth;
pub mod claim;
pub mod health;
pub mod meal;
pub mod notification;

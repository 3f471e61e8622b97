pub mod auth;
pub mod comments;
pub mod errors;
pub mod ids;
pub mod images;
pub mod pages;
pub mod tags;
pub mod texts;
pub mod tree;
pub mod users;
pub mod views;

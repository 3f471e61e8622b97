pub mod linkify;
pub mod sanitize;

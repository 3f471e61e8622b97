pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod demo_seeder;
pub mod error;
pub mod pagination;
pub mod rendering;
pub mod storage;
pub mod tree;

#[cfg(test)]
mod test_support;

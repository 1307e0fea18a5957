pub mod alert;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod models;
pub mod navigation;
pub mod ocr;
pub mod repl;
pub mod services;

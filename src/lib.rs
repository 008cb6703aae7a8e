//! Study Hub - notebooks, AI-assisted Q&A and quizzes for self-study
//!
//! Study Hub keeps a student's notebooks, course material, chat threads,
//! quizzes and study plan in a single state store, tracks streaks, skills and
//! goals, and talks to a backend that indexes documents and generates
//! answers and quizzes.

pub mod api;
pub mod app;
pub mod config;
pub mod export;
pub mod store;

pub use api::ApiClient;
pub use app::App;
pub use config::Config;
pub use store::Store;

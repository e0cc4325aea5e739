pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod interceptor;
pub mod login;
pub mod post;
pub mod provider;
pub mod session;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use export::ScrapeResult;
pub use post::{Post, PostStore};
pub use provider::FeedProvider;
pub use session::SessionStore;

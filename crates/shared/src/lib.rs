// Public modules
pub mod claude;
pub mod config;
pub mod digest;
pub mod feed;
pub mod gemini;
pub mod keywords;
pub mod line;
pub mod models;
pub mod pipeline;
pub mod summarizer;

// Re-export commonly used types
pub use claude::ClaudeSummarizer;
pub use config::{Config, LineCredentials, Overrides};
pub use digest::{top_five, DigestGenerator};
pub use feed::{parse_feed, FeedClient};
pub use gemini::GeminiSummarizer;
pub use keywords::fallback_categorize;
pub use line::{LineClient, LineError};
pub use models::{Analysis, Article, Category, ClassifiedArticle, DailyTrend, DigestData, TopTopic};
pub use pipeline::{report_setup_failure, setup_notifier, DigestRunner, RunReport};
pub use summarizer::{Summarizer, SummarizerChain};

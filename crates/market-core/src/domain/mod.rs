//! 도메인 모델.

pub mod fundamentals;
pub mod prediction;
pub mod quote;
pub mod top_traded;

pub use fundamentals::{FundamentalsFilter, FundamentalsRecord};
pub use prediction::PredictionRecord;
pub use quote::{FeaturePoint, QuotePoint, QuoteRow};
pub use top_traded::TopTradedRow;

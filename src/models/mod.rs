pub mod answer;
pub mod attempt;
pub mod item_stats;
pub mod question;
pub mod quiz;

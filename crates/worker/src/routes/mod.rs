pub mod generate;
pub mod health;
pub mod trade_ads;

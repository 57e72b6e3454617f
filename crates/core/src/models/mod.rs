pub mod currency;
pub mod portfolio;
pub mod rate;
pub mod settings;
pub mod user;
pub mod wallet;

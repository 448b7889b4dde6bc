pub mod coinmarketcap;
pub mod cryptopanic;

pub mod paper;

pub use paper::{PaperExchange, PaperExchangeConfig};

pub mod order;
pub mod portfolio;
pub mod stock;
pub mod user;
pub mod wallet;

pub use order::{Order, OrderSide};
pub use portfolio::{Holding, PortfolioEntry, PortfolioView};
pub use stock::Stock;
pub use user::{parse_user_id, User, UserId};
pub use wallet::{WalletMethod, WalletTransaction};

pub mod money;
pub mod price;
pub mod quantity;
pub mod symbol;

pub use money::Money;
pub use price::Price;
pub use quantity::Quantity;
pub use symbol::Symbol;

pub mod actor;
pub mod advertisement;
pub mod faq;
pub mod order;
pub mod product;
pub mod property;
pub mod shop;

pub use actor::*;
pub use advertisement::*;
pub use faq::*;
pub use order::*;
pub use product::*;
pub use property::*;
pub use shop::*;

pub mod config;
pub mod group;
pub mod item;
pub mod store;
pub mod view;

pub use config::*;
pub use group::*;
pub use item::*;
pub use store::*;
pub use view::*;

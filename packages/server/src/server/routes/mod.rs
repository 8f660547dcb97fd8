// HTTP routes
pub mod export;
pub mod health;
pub mod scrape;
pub mod sites;
pub mod stream;

pub use export::*;
pub use health::*;
pub use scrape::*;
pub use sites::*;
pub use stream::*;

pub mod models;
pub mod store;
pub mod tags;

pub use models::{NewPostcard, Postcard, PostcardStatus, PostcardUpdate, Tag, ERAS, PAGE_SIZE, TYPES};
pub use store::{CatalogStore, PostcardFilters};
pub use tags::TagStore;

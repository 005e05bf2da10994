pub mod duplicate;
pub mod model;
pub mod pricing;
pub mod store;

pub use duplicate::{canonicalize, DuplicateGuard};
pub use model::{CreatedTask, ImageVariant, Task, TaskStatus};
pub use pricing::{FixedPrice, PriceGenerator, RandomPrice, MAX_PRICE, MIN_PRICE};
pub use store::{NewTask, NewVariant, TaskFilter, TaskStore};

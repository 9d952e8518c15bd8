pub mod lifecycle;

pub use lifecycle::{Filters, LifecycleController, Mode};

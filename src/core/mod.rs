//! Core store types: the container, its views and scoped overrides.

pub mod dotkey;

mod builder;
mod container;
mod context;
mod loader;
mod observer;
mod store;
mod view;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use context::ScopedOverride;
pub use dotkey::{FlatMap, Prefix};
pub use observer::{Observer, ObserverId, Rebinding};
pub use store::Store;
pub use view::{Scoped, View, ViewBuilder, type_dotkey, type_prefixes};

pub(crate) use loader::SourceLoader;

//! Collection controllers: ordered, identity-keyed local caches of one scoped
//! remote collection each.

mod controller;
mod token;

pub use controller::{CollectionController, ObjectKey};

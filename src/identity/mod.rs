//! Identity boundary: principal types, the provider trait, and the session handle
//! the rest of the crate subscribes through.

mod principal;
mod provider;
mod session;
pub mod memory;

pub use principal::{Claims, Principal, ProviderUser};
pub use provider::{AuthChangeHandler, IdentityProvider, SubscriptionId, UserCredential};
pub use session::{IdentitySession, Subscription};
pub use memory::MemoryIdentityProvider;

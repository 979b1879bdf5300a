pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use entities::{Customer, Diagnostics, Order, PaymentDetails, PaymentPatch};
pub use events::*;
pub use value_objects::{CanonicalStatus, Gateway, Money, PaymentStatus, ReferenceField};

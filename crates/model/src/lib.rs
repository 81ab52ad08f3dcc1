//! Domain model shared by every layer of the bike marketplace backend.
//!
//! Entities mirror the relational schema one-to-one; request inputs and
//! pagination types live next to them so the service and HTTP layers agree on
//! a single vocabulary.

mod entity;
mod input;
mod pagination;

pub use entity::{
    Bike, Cart, CartItem, Category, Gender, Order, Profile, Review, Role, RoleMap, Transaction,
    TransactionStatus, User,
};
pub use input::{
    BikeFilter, BikeUpdate, CartLineView, CartView, CheckoutLine, LineUpdate, NewBike, NewOrder,
    NewReview, NewUser, ProfileUpdate,
};
pub use pagination::{Metadata, PageRequest, DEFAULT_LIMIT, MAX_LIMIT, MAX_PAGE};

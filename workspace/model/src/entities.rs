//! SeaORM entity modules for the user store.
//! The schema itself is owned by the `migration` crate.

pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::user::Entity as User;
}

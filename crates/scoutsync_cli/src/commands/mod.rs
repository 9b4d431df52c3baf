//! Command implementations.

pub mod check_users;
pub mod sync_lists;

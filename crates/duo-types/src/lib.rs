pub mod codes;
pub mod content;
pub mod dates;
pub mod events;
pub mod models;
pub mod mutations;
pub mod pick;

pub mod books;
pub mod countries;
pub mod users;

pub mod category;
pub mod comment;
pub mod confirmation_code;
pub mod genre;
pub mod review;
pub mod role;
pub mod title;
pub mod title_genre;
pub mod user;

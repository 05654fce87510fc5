mod auth;
mod comment;
mod common;
mod review;

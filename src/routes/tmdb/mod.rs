mod handler;

pub use handler::{movie_details, search, test_connection};

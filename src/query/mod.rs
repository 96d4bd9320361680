//! Request pipeline shared by every protocol: bounded retries and the
//! service-by-parameter search loop.

pub mod query_loop;
pub mod retry;

pub use query_loop::{query_loop, ErrorHandling, OneSearch};
pub use retry::{try_query, RetryPolicy};

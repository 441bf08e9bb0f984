//! Typed read/write operations over the platform tables. Every function
//! takes a `&mut PgConnection`, so calls made with `&mut *tx` join the
//! caller's transaction.

pub mod meta;
pub mod options;
pub mod posts;
pub mod terms;
pub mod users;

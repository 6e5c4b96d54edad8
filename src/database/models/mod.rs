pub mod job;
pub mod user;

pub use job::{Job, JobField, JobFilter, JobNew};
pub use user::{User, UserCredentials, UserDetail, UserField, UserNew};

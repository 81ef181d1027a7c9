#[derive(Debug, PartialEq, Eq)]
pub enum FindError {
    NotFound,
    Internal,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WriteError {
    /// A unique column (user or subscriber email) already holds the value.
    Duplicate,
    Internal,
}

mod sql;
pub use sql::*;

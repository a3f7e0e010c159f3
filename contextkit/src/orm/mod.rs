//! Query layer
//!
//! Record types describe their table through [`Schema`]. An ordered list of
//! [`QueryOption`]s is compiled into a [`Query`], which the verbs in
//! [`repository`] execute against a [`Store`](crate::Store):
//!
//! ```rust,ignore
//! use contextkit::orm::repository;
//! use contextkit::{Condition, OrderItem, QueryOption};
//!
//! let page = repository::list_paginated::<Item>(&store, &[
//!     QueryOption::filter(Condition::eq("active", true)),
//!     QueryOption::order_by(OrderItem::desc("reference")),
//!     QueryOption::paginate(1, 20),
//! ])
//! .await?;
//! ```

mod builder;
pub mod changeset;
mod filters;
mod json_options;
pub mod options;
mod pagination;
pub mod preload;
pub mod repository;
mod traits;

pub use builder::*;
pub use changeset::{
    Action, Attrs, Changeset, ChangesetFn, ChangesetFnPtr, FieldErrors, NumberRange,
};
pub use filters::*;
pub use options::{PageRequest, QueryOption};
pub use pagination::Pagination;
pub use preload::Preload;
pub use traits::*;

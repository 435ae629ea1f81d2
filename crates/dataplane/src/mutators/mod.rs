//! Field level mutators shared by the components.
//!
//! Each helper drives one field or subtree of an object to a desired value and leaves
//! everything it does not own untouched, including fields the API server defaulted. That is
//! what lets the applier detect "no change" by plain equality.

pub mod container;
pub mod env;
pub mod maps;
pub mod node_terms;
pub mod pod;
pub mod volumes;

/// `None` for an empty list. The API server drops empty lists, so writing `Some(vec![])`
/// would never compare equal to what is read back.
pub fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

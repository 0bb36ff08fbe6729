//! Catalog entities and their field rules.

pub mod book;

pub use book::{normalize_key, Book, ValidationError, ISBN_LENGTH};

/// Property names used on book nodes.
pub mod props {
    pub const ISBN: &str = "book:isbn";
    pub const TITLE: &str = "book:title";
    pub const AUTHOR: &str = "book:author";
    pub const PUBLICATION_DATE: &str = "book:publicationDate";
    pub const FIRST_PUBLICATION_DATE: &str = "book:firstPublicationDate";
    pub const SHORT_DESCRIPTION: &str = "book:shortDescription";
}

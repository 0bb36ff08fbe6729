use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::props;
use crate::repository::{NodePath, NodeStore, PropertyValue, StoreError, StoreResult};

/// Required length of a normalized ISBN.
pub const ISBN_LENGTH: usize = 13;

/// Reasons a book cannot be stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ISBN field is required to save a book")]
    MissingIsbn,
    #[error("ISBN field must be 13 digits, got {len}")]
    IsbnLength { len: usize },
}

/// Strips every character that is not an ASCII digit.
pub fn normalize_key(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// A catalog entry, keyed by its ISBN.
///
/// The ISBN is normalized on every assignment, including deserialization,
/// and `author` is never absent: a missing or `null` list becomes empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    /// Authors in print priority order.
    #[serde(default, deserialize_with = "nullable_list")]
    author: Vec<String>,
    #[serde(default, deserialize_with = "normalized_key")]
    isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publication_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_publication_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    short_description: Option<String>,
}

fn nullable_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn normalized_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|raw| normalize_key(&raw))
        .unwrap_or_default())
}

impl Book {
    pub fn new(isbn: &str) -> Self {
        let mut book = Self::default();
        book.set_isbn(isbn);
        book
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn set_isbn(&mut self, raw: &str) {
        self.isbn = normalize_key(raw);
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn author(&self) -> &[String] {
        &self.author
    }

    /// Stores the list verbatim, or an empty list when `None`.
    pub fn set_author(&mut self, author: Option<Vec<String>>) {
        self.author = author.unwrap_or_default();
    }

    pub fn publication_date(&self) -> Option<NaiveDate> {
        self.publication_date
    }

    pub fn set_publication_date(&mut self, date: Option<NaiveDate>) {
        self.publication_date = date;
    }

    pub fn first_publication_date(&self) -> Option<NaiveDate> {
        self.first_publication_date
    }

    pub fn set_first_publication_date(&mut self, date: Option<NaiveDate>) {
        self.first_publication_date = date;
    }

    pub fn short_description(&self) -> Option<&str> {
        self.short_description.as_deref()
    }

    pub fn set_short_description(&mut self, description: Option<String>) {
        self.short_description = description;
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.author = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_publication_date(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_first_publication_date(mut self, date: NaiveDate) -> Self {
        self.first_publication_date = Some(date);
        self
    }

    pub fn with_short_description(mut self, description: impl Into<String>) -> Self {
        self.short_description = Some(description.into());
        self
    }

    /// Checks the fields required before any node is touched.
    pub fn validate_for_save(&self) -> Result<(), ValidationError> {
        if is_blank(&self.isbn) {
            return Err(ValidationError::MissingIsbn);
        }
        let len = self.isbn.chars().count();
        if len != ISBN_LENGTH {
            return Err(ValidationError::IsbnLength { len });
        }
        Ok(())
    }

    /// Reads a book from a node. Properties that are not present leave the
    /// matching field unset.
    pub fn load<S: NodeStore + ?Sized>(store: &S, node: &NodePath) -> StoreResult<Self> {
        let mut book = Book::default();

        if let Some(isbn) = read_string(store, node, props::ISBN)? {
            book.set_isbn(&isbn);
        }
        book.title = read_string(store, node, props::TITLE)?;
        if let Some(authors) = read_strings(store, node, props::AUTHOR)? {
            book.author = authors;
        }
        book.publication_date = read_date(store, node, props::PUBLICATION_DATE)?;
        book.first_publication_date = read_date(store, node, props::FIRST_PUBLICATION_DATE)?;
        book.short_description = read_string(store, node, props::SHORT_DESCRIPTION)?;

        Ok(book)
    }

    /// Writes the key and every present, non-blank field to `node`.
    ///
    /// Fields that are absent here are left as they are on the node.
    pub fn write_to<S: NodeStore + ?Sized>(&self, store: &mut S, node: &NodePath) -> StoreResult<()> {
        store.set_property(node, props::ISBN, self.isbn.clone().into())?;

        if let Some(title) = self.title.as_deref().filter(|t| !is_blank(t)) {
            store.set_property(node, props::TITLE, title.into())?;
        }
        if !self.author.is_empty() {
            store.set_property(node, props::AUTHOR, self.author.clone().into())?;
        }
        if let Some(date) = self.publication_date {
            store.set_property(node, props::PUBLICATION_DATE, date.into())?;
        }
        if let Some(date) = self.first_publication_date {
            store.set_property(node, props::FIRST_PUBLICATION_DATE, date.into())?;
        }
        if let Some(description) = self.short_description.as_deref().filter(|d| !is_blank(d)) {
            store.set_property(node, props::SHORT_DESCRIPTION, description.into())?;
        }
        Ok(())
    }
}

fn type_error(node: &NodePath, name: &str, expected: &'static str) -> StoreError {
    StoreError::PropertyType {
        path: node.to_string(),
        name: name.to_string(),
        expected,
    }
}

fn read_string<S: NodeStore + ?Sized>(store: &S, node: &NodePath, name: &str) -> StoreResult<Option<String>> {
    match store.get_property(node, name)? {
        None => Ok(None),
        Some(PropertyValue::String(s)) => Ok(Some(s)),
        Some(_) => Err(type_error(node, name, "string")),
    }
}

fn read_strings<S: NodeStore + ?Sized>(store: &S, node: &NodePath, name: &str) -> StoreResult<Option<Vec<String>>> {
    match store.get_property(node, name)? {
        None => Ok(None),
        Some(PropertyValue::Strings(values)) => Ok(Some(values)),
        Some(_) => Err(type_error(node, name, "multi-value string")),
    }
}

fn read_date<S: NodeStore + ?Sized>(store: &S, node: &NodePath, name: &str) -> StoreResult<Option<NaiveDate>> {
    match store.get_property(node, name)? {
        None => Ok(None),
        Some(PropertyValue::Date(date)) => Ok(Some(date)),
        Some(_) => Err(type_error(node, name, "date")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("978-0-399-22690-8"), "9780399226908");
        assert_eq!(normalize_key(" ISBN 978 0399226908 "), "9780399226908");
        assert_eq!(normalize_key("no digits"), "");
        for raw in ["978-0-399-22690-8", "abc", "", "12x3"] {
            assert_eq!(normalize_key(&normalize_key(raw)), normalize_key(raw));
        }
    }

    #[test]
    fn test_set_isbn_normalizes() {
        let mut book = Book::default();
        book.set_isbn("978-0399226908");
        assert_eq!(book.isbn(), "9780399226908");
    }

    #[test]
    fn test_set_author_none_resets_to_empty() {
        let mut book = Book::new("9780803736801").with_authors(["Adam Rubin", "Daniel Salmieri"]);
        assert_eq!(book.author(), ["Adam Rubin", "Daniel Salmieri"]);
        book.set_author(None);
        assert!(book.author().is_empty());
    }

    #[test]
    fn test_validate_for_save() {
        assert_eq!(Book::default().validate_for_save(), Err(ValidationError::MissingIsbn));
        assert_eq!(Book::new("abc-def").validate_for_save(), Err(ValidationError::MissingIsbn));
        assert_eq!(
            Book::new("978-039922690").validate_for_save(),
            Err(ValidationError::IsbnLength { len: 12 })
        );
        assert_eq!(
            Book::new("97803992269081").validate_for_save(),
            Err(ValidationError::IsbnLength { len: 14 })
        );
        assert!(Book::new("978-0-399-22690-8").validate_for_save().is_ok());
    }

    #[test]
    fn test_json_shape() {
        let book: Book = serde_json::from_value(json!({
            "isbn": "978-0803736801",
            "title": "Dragons Love Tacos",
            "author": null,
            "publicationDate": "2012-06-14"
        }))
        .unwrap();

        assert_eq!(book.isbn(), "9780803736801");
        assert!(book.author().is_empty());
        assert_eq!(book.publication_date(), Some(date(2012, 6, 14)));
        assert_eq!(book.short_description(), None);

        let out = serde_json::to_value(&book).unwrap();
        assert_eq!(
            out,
            json!({
                "isbn": "9780803736801",
                "title": "Dragons Love Tacos",
                "author": [],
                "publicationDate": "2012-06-14"
            })
        );
    }

    #[test]
    fn test_write_and_load() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let node = session.add_child(&NodePath::root(), "9780399226908", "book:Book").unwrap();

        let book = Book::new("9780399226908")
            .with_title("The Very Hungry Caterpillar")
            .with_authors(["Eric Carle"])
            .with_publication_date(date(1994, 3, 23))
            .with_first_publication_date(date(1969, 6, 3))
            .with_short_description("A classic.");
        book.write_to(&mut session, &node).unwrap();

        assert_eq!(Book::load(&session, &node).unwrap(), book);
    }

    #[test]
    fn test_write_is_sparse() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let node = session.add_child(&NodePath::root(), "9780399226908", "book:Book").unwrap();

        let mut book = Book::new("9780399226908").with_title("   ");
        book.set_short_description(Some(String::new()));
        book.write_to(&mut session, &node).unwrap();

        assert!(session.has_property(&node, props::ISBN).unwrap());
        for name in [
            props::TITLE,
            props::AUTHOR,
            props::PUBLICATION_DATE,
            props::FIRST_PUBLICATION_DATE,
            props::SHORT_DESCRIPTION,
        ] {
            assert!(!session.has_property(&node, name).unwrap(), "{} was written", name);
        }

        let loaded = Book::load(&session, &node).unwrap();
        assert_eq!(loaded.title(), None);
        assert_eq!(loaded.short_description(), None);
        assert!(loaded.author().is_empty());
    }

    #[test]
    fn test_load_rejects_wrong_property_shape() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let node = session.add_child(&NodePath::root(), "n", "book:Book").unwrap();
        session.set_property(&node, props::AUTHOR, "Eric Carle".into()).unwrap();

        assert!(matches!(
            Book::load(&session, &node),
            Err(StoreError::PropertyType { .. })
        ));
    }
}

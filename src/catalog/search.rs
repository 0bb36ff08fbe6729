use log::debug;

use crate::model::{props, Book};
use crate::repository::{query, NodePath, NodeStore, TextSearch};
use crate::Result;

/// Finds books under `root` whose text contains every word of `text`.
///
/// The text is escaped before it reaches the query language, so operators
/// typed by a caller are matched literally. Shard folders carry no ISBN
/// property and never appear in the results.
pub fn search<S: NodeStore + TextSearch + ?Sized>(store: &S, root: &NodePath, text: &str) -> Result<Vec<Book>> {
    let expression = query::escape(text);
    if expression.is_empty() {
        return Ok(Vec::new());
    }

    let hits = store.search(root, &expression, props::ISBN)?;
    debug!("Search matched {} nodes", hits.len());

    let mut books = Vec::with_capacity(hits.len());
    for node in &hits {
        books.push(Book::load(store, node)?);
    }
    Ok(books)
}

/// Escapes markup-significant characters before user input is echoed back.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

use chrono::NaiveDate;

use crate::model::Book;

pub const DRAGONS_DESC: &str = "Dragons love tacos. They love chicken tacos, beef tacos, great big tacos, and teeny tiny tacos. So if you want to lure a bunch of dragons to your party, you should definitely serve tacos. Buckets and buckets of tacos. Unfortunately, where there are tacos, there is also salsa. And if a dragon accidentally eats spicy salsa . . . oh, boy. You're in red-hot trouble.";

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Demo books used by `seed`.
pub fn sample_books() -> Vec<Book> {
    let mut caterpillar = Book::new("978-0399226908")
        .with_title("The Very Hungry Caterpillar")
        .with_authors(["Eric Carle"])
        .with_short_description("THE all-time classic picture book, from generation to generation, sold somewhere in the world every 30 seconds! Have you shared it with a child or grandchild in your life?");
    caterpillar.set_publication_date(date(1994, 3, 23));

    let mut dragons = Book::new("978-0803736801")
        .with_title("Dragons Love Tacos")
        .with_authors(["Adam Rubin", "Daniel Salmieri"])
        .with_short_description(DRAGONS_DESC);
    dragons.set_publication_date(date(2012, 6, 20));

    let mut places = Book::new("978-0679805274")
        .with_title("Oh, The Places You'll Go!")
        .with_authors(["Dr. Seuss"])
        .with_short_description("Dr. Seuss's wonderfully wise Oh, the Places You'll Go! is the perfect send-off for grads - from nursery school, high school, college, and beyond! From soaring to high heights and seeing great sights to being left in a Lurch on a prickle-ly perch, Dr. Seuss addresses life's ups and downs with his trademark humorous verse and illustrations, while encouraging readers to find the success that lies within. In a starred review, Booklist notes, \"Seuss's message is simple but never sappy: life may be a 'Great Balancing Act,' but through it all 'There's fun to be done.'\" A perennial favorite and a perfect gift for anyone starting a new phase in their life!");
    places.set_publication_date(date(1990, 1, 22));

    vec![caterpillar, dragons, places]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_valid_and_distinct() {
        let books = sample_books();
        assert_eq!(books.len(), 3);
        for book in &books {
            book.validate_for_save().unwrap();
            assert!(book.publication_date().is_some());
        }
        let places = &books[2];
        assert!(places.short_description().is_some_and(|d| d.ends_with("starting a new phase in their life!")));
        let mut isbns: Vec<&str> = books.iter().map(Book::isbn).collect();
        isbns.sort();
        isbns.dedup();
        assert_eq!(isbns.len(), 3);
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published: i32,
    pub rating: f64,
    pub tags: Vec<String>,
    pub awards: BTreeMap<String, bool>,
}

impl Book {
    pub fn new(
        title: &str,
        author: &str,
        genre: &str,
        published: i32,
        rating: f64,
        tags: &[&str],
        awards: &[(&str, bool)],
    ) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published,
            rating,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            awards: awards.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// Average rating of one genre.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GenreRating {
    pub genre: String,
    pub avg_rating: f64,
}

/// The ten sample books, keyed `book1` to `book10`.
pub fn sample_books() -> Vec<(&'static str, Book)> {
    vec![
        ("book1", Book::new(
            "The Hitchhiker's Guide to the Galaxy", "Douglas Adams", "Science Fiction", 1979, 4.2,
            &["comedy", "space", "adventure"], &[("hugo", true), ("nebula", false)],
        )),
        ("book2", Book::new(
            "Pride and Prejudice", "Jane Austen", "Romance", 1813, 4.5,
            &["classic", "social commentary", "love"], &[("none", true)],
        )),
        ("book3", Book::new(
            "One Hundred Years of Solitude", "Gabriel García Márquez", "Magical Realism", 1967, 4.3,
            &["family", "history", "fantasy"], &[("nobel", true), ("nebula", false)],
        )),
        ("book4", Book::new(
            "The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 4.7,
            &["adventure", "magic", "epic"], &[("hugo", false), ("nebula", false)],
        )),
        ("book5", Book::new(
            "The Handmaid's Tale", "Margaret Atwood", "Dystopian", 1985, 4.1,
            &["feminism", "totalitarianism", "resistance"],
            &[("arthur c. clarke", true), ("booker prize", false)],
        )),
        ("book6", Book::new(
            "Crime and Punishment", "Fyodor Dostoevsky", "Psychological Thriller", 1866, 4.3,
            &["philosophy", "crime", "redemption"], &[("none", true)],
        )),
        ("book7", Book::new(
            "To Kill a Mockingbird", "Harper Lee", "Southern Gothic", 1960, 4.2,
            &["racism", "injustice", "coming-of-age"], &[("pulitzer", true)],
        )),
        ("book8", Book::new(
            "1984", "George Orwell", "Dystopian", 1949, 4.2,
            &["surveillance", "totalitarianism", "propaganda"], &[("prometheus", true)],
        )),
        ("book9", Book::new(
            "The Great Gatsby", "F. Scott Fitzgerald", "Modernist", 1925, 4.0,
            &["wealth", "american dream", "love"], &[("none", true)],
        )),
        ("book10", Book::new(
            "Dune", "Frank Herbert", "Science Fiction", 1965, 4.6,
            &["politics", "desert", "ecology"], &[("hugo", true), ("nebula", true)],
        )),
    ]
}

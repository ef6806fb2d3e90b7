use serde::{Deserialize, Serialize};

/// A document in a `Countries/{country}/Cities` subcollection.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct City {
    pub population: i64,
}

pub fn sample_cities() -> Vec<(&'static str, Vec<(&'static str, City)>)> {
    let city = |population| City { population };
    vec![
        ("France", vec![("Paris", city(100)), ("Lyon", city(50)), ("Marseille", city(80))]),
        ("Canada", vec![("Montreal", city(90)), ("Toronto", city(120)), ("Vancouver", city(70))]),
        ("Germany", vec![("Berlin", city(150)), ("Hamburg", city(110))]),
    ]
}

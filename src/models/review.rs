use once_cell::sync::Lazy;

use super::schema::{Field, Schema};
use super::{Expansion, Model, Tour, User};

pub struct Review;

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        Field::string("review")
            .required("Review must contain a content")
            .trim()
            .min_length(10, "Review must be at least 10 characters long")
            .max_length(500, "Review must not exceed 500 characters"),
        Field::integer("rating")
            .required("Review must have a rating")
            .min(1.0, "Rating must be an integer value between 1 and 5")
            .max(5.0, "Rating must be an integer value between 1 and 5"),
        Field::reference("tour").required("Review must belong to a tour."),
        Field::reference("user").required("Review must belong to a user."),
    ])
});

impl Review {
    pub const TOUR: Expansion = Expansion::Reference {
        field: "tour",
        collection: "tours",
        select: &["name"],
        scope: Tour::scope,
    };

    pub const USER: Expansion = Expansion::Reference {
        field: "user",
        collection: "users",
        select: &["name", "photo"],
        scope: User::scope,
    };
}

impl Model for Review {
    const COLLECTION: &'static str = "reviews";

    fn schema() -> &'static Schema {
        &SCHEMA
    }
}

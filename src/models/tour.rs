use once_cell::sync::Lazy;
use serde_json::Value;

use super::schema::{number, ElementType, Field, Schema};
use super::{Expansion, Model, Review, SaveContext, User};
use crate::error::ApiError;
use crate::filter::{Filter, FilterOp};
use crate::types::Document;

pub struct Tour;

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        Field::string("name")
            .required("A tour must have a name")
            .trim()
            .min_length(10, "A tour name must have more or equal than 10 characters")
            .max_length(40, "A tour name must have less or equal than 40 characters"),
        Field::string("slug").internal(),
        Field::number("duration").required("A tour must have a duration"),
        Field::integer("maxGroupSize").required("A tour must have a group size"),
        Field::string("difficulty")
            .required("A tour must have a difficulty")
            .one_of(DIFFICULTIES, "Difficulty is either: easy, medium, difficult"),
        Field::number("ratingsAverage")
            .default_value(4.5)
            .min(1.0, "Rating must be above 1.0")
            .max(5.0, "Rating must be below 5.0"),
        Field::integer("ratingsQuantity").default_value(0),
        Field::number("price").required("A tour must have a price"),
        Field::number("priceDiscount"),
        Field::string("summary").required("A tour must have a summary").trim(),
        Field::string("description").trim(),
        Field::string("imageCover").required("A tour must have a cover image"),
        Field::array("images", ElementType::String),
        Field::array("startDates", ElementType::Timestamp),
        Field::boolean("secretTour").default_value(false),
        Field::object("startLocation"),
        Field::array("locations", ElementType::Any),
        Field::array("guides", ElementType::Reference),
    ])
    .check(|merged, changes| {
        if !changes.contains_key("priceDiscount") && !changes.contains_key("price") {
            return None;
        }
        let discount = merged.get("priceDiscount").and_then(Value::as_f64)?;
        let price = merged.get("price").and_then(Value::as_f64)?;
        (discount >= price).then(|| {
            ("priceDiscount", format!("Discount price ({}) should be below regular price", discount))
        })
    })
});

impl Tour {
    /// Lookup of a tour's guides
    pub const GUIDES: Expansion = Expansion::Reference {
        field: "guides",
        collection: "users",
        select: &["name", "email", "photo", "role"],
        scope: User::scope,
    };

    /// Reviews written for a tour
    pub const REVIEWS: Expansion = Expansion::Virtual {
        as_field: "reviews",
        collection: "reviews",
        foreign_field: "tour",
        scope: Review::scope,
    };
}

impl Model for Tour {
    const COLLECTION: &'static str = "tours";
    const UNIQUE: &'static [&'static str] = &["name"];

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn scope() -> Filter {
        Filter::new().with("secretTour", FilterOp::Ne, true)
    }

    fn before_save(doc: &mut Document, _ctx: &SaveContext) -> Result<(), ApiError> {
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            doc.insert("slug".to_string(), Value::String(slug));
        }
        Ok(())
    }

    fn present(doc: &mut Document) {
        if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeeks".to_string(), number(duration / 7.0));
        }
    }
}

/// `The Forest Hiker` -> `the-forest-hiker`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

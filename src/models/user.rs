use chrono::Duration;
use once_cell::sync::Lazy;
use serde_json::Value;

use super::schema::{Field, Schema};
use super::{Model, SaveContext};
use crate::auth::{hash_password, Role};
use crate::error::ApiError;
use crate::filter::{Filter, FilterOp};
use crate::types::{parse_timestamp, timestamp, Document};

pub struct User;

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        Field::string("name")
            .required("User must have a name")
            .trim()
            .min_length(3, "Name must be at least 3 characters long")
            .max_length(50, "Name must not exceed 50 characters"),
        Field::string("email")
            .required("User must have an email")
            .trim()
            .lowercase()
            .email("Please enter a valid email address"),
        Field::string("photo").default_value("default.jpg"),
        Field::string("role")
            .one_of(&Role::ALL, "Role is either: user, guide, lead-guide, admin")
            .default_value(Role::User.as_str()),
        Field::string("password")
            .required("User must have a password")
            .min_length(8, "Password must be at least 8 characters long"),
        Field::string("passwordConfirm"),
        Field::timestamp("passwordChangedAt").internal(),
        Field::string("passwordResetToken").internal(),
        Field::timestamp("passwordResetExpires").internal(),
        Field::boolean("active").internal().default_value(true),
    ])
    .check(|merged, changes| {
        changes.get("password")?;
        let confirmed = merged.get("passwordConfirm") == merged.get("password");
        (!confirmed).then(|| ("passwordConfirm", "Passwords do not match".to_string()))
    })
});

impl User {
    pub const PASSWORD: &'static str = "password";

    /// Role stored on a user document; unknown values fall back to `user`
    pub fn role(doc: &Document) -> Role {
        doc.get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::User)
    }

    /// Whether the password changed after a token issued at `issued_at`
    /// (unix seconds)
    pub fn changed_password_after(doc: &Document, issued_at: i64) -> bool {
        doc.get("passwordChangedAt")
            .and_then(parse_timestamp)
            .is_some_and(|changed| changed.timestamp() > issued_at)
    }
}

impl Model for User {
    const COLLECTION: &'static str = "users";
    const UNIQUE: &'static [&'static str] = &["email"];
    const HIDDEN: &'static [&'static str] = &[
        "password",
        "passwordConfirm",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn scope() -> Filter {
        Filter::new().with("active", FilterOp::Ne, false)
    }

    /// Hash new passwords. Changing the password of an existing user also
    /// stamps `passwordChangedAt` one second in the past, so a token issued
    /// right after the change stays valid, and voids any pending reset token.
    fn before_save(doc: &mut Document, ctx: &SaveContext) -> Result<(), ApiError> {
        doc.remove("passwordConfirm");
        let Some(password) = doc.get(Self::PASSWORD).and_then(Value::as_str) else {
            return Ok(());
        };

        let hashed = hash_password(password)?;
        doc.insert(Self::PASSWORD.to_string(), Value::String(hashed));

        if ctx.is_new {
            return Ok(());
        }
        doc.insert(
            "passwordChangedAt".to_string(),
            timestamp(ctx.now - Duration::seconds(1)),
        );
        // A null change removes the stored field
        doc.insert("passwordResetToken".to_string(), Value::Null);
        doc.insert("passwordResetExpires".to_string(), Value::Null);
        Ok(())
    }
}

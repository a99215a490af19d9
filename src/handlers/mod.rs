// Route handlers, one module per resource. Generic CRUD lives in `factory`;
// resource modules wire it to routes and add their own endpoints.
pub mod auth;
pub mod body;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;

pub use body::JsonBody;
pub use factory::HandlerFactory;

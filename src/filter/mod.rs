pub mod error;
pub mod eval;
pub mod filter_order;
pub mod filter_where;
pub mod pipeline;
pub mod sql;
pub mod translator;
pub mod types;

pub use error::{FilterError, QueryError};
pub use eval::FilterEval;
pub use pipeline::QueryPipeline;
pub use sql::FilterSql;
pub use translator::FilterTranslator;
pub use types::*;

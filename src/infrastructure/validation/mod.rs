//! Schema validator implementations

mod required_columns;

pub use required_columns::RequiredColumnsValidator;

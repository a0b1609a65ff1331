//! Schema contracts for flow input and output.
//!
//! A schema is an ordered list of named fields, each described by a
//! [`FieldType`] (string, number, boolean, media, array, nested object) with
//! optional constraints and a human-readable description. The same schema
//! validates data in both directions and documents the flow to the model.
//!
//! # Examples
//!
//! ```
//! use shiksha_flows::schema::{validate, ExcessFields, FieldType, ObjectSchema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::new("Question")
//!     .field("question", FieldType::string().min_length(10), "The student's question.");
//!
//! let ok = validate(&json!({"question": "Why is the sky blue?"}), &schema, ExcessFields::Strict);
//! assert!(ok.is_ok());
//!
//! let too_short = validate(&json!({"question": "sky?"}), &schema, ExcessFields::Strict);
//! assert!(too_short.is_err());
//! ```

pub mod error;
pub mod field;
pub mod validator;

// Re-export commonly used types
pub use error::ValidationError;
pub use field::{Field, FieldType, ObjectSchema};
pub use validator::{validate, ExcessFields, SchemaValidator};

//! Prompt templates.
//!
//! A template is a Handlebars-style string with three placeholder forms:
//!
//! - `{{field}}` and `{{{field}}}`: substitute the field's value as text
//!   (no escaping in either form)
//! - `{{media url=field}}`: attach the field's `data:` URI as an inline
//!   media part
//!
//! Templates are compiled against the flow's input schema, so a reference to
//! an undeclared field is caught when the flow is defined rather than when it
//! is invoked.

mod template;

pub use template::{PromptPart, PromptTemplate, RenderedPrompt};

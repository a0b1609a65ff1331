//! Tagged-variant field descriptors and object schemas.

use serde_json::{json, Map, Value};

use crate::media::MediaKind;

/// Semantic type of a field, with its constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
        /// Reject values with a fractional part.
        integer: bool,
        /// Accept a quoted numeric string and convert it to a number.
        coercible: bool,
    },
    Boolean,
    /// A `data:` URI string carrying a blob of the given kind.
    ///
    /// Validation only checks that the value is a string; the blob itself is
    /// checked when the prompt is rendered.
    Media { kind: MediaKind },
    Array {
        items: Box<FieldType>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object(ObjectSchema),
}

impl FieldType {
    pub fn string() -> Self {
        FieldType::String {
            min_length: None,
            max_length: None,
        }
    }

    pub fn number() -> Self {
        FieldType::Number {
            minimum: None,
            maximum: None,
            integer: false,
            coercible: false,
        }
    }

    pub fn integer() -> Self {
        FieldType::Number {
            minimum: None,
            maximum: None,
            integer: true,
            coercible: false,
        }
    }

    pub fn boolean() -> Self {
        FieldType::Boolean
    }

    pub fn media(kind: MediaKind) -> Self {
        FieldType::Media { kind }
    }

    pub fn array_of(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn object(schema: ObjectSchema) -> Self {
        FieldType::Object(schema)
    }

    /// Minimum string length in characters. No effect on non-string types.
    pub fn min_length(mut self, n: usize) -> Self {
        if let FieldType::String { min_length, .. } = &mut self {
            *min_length = Some(n);
        }
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        if let FieldType::String { max_length, .. } = &mut self {
            *max_length = Some(n);
        }
        self
    }

    /// Inclusive numeric bounds. No effect on non-number types.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        if let FieldType::Number {
            minimum, maximum, ..
        } = &mut self
        {
            *minimum = Some(min);
            *maximum = Some(max);
        }
        self
    }

    pub fn coercible(mut self) -> Self {
        if let FieldType::Number { coercible, .. } = &mut self {
            *coercible = true;
        }
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        if let FieldType::Array { min_items, .. } = &mut self {
            *min_items = Some(n);
        }
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        if let FieldType::Array { max_items, .. } = &mut self {
            *max_items = Some(n);
        }
        self
    }

    /// Type name as used in JSON schema and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String { .. } | FieldType::Media { .. } => "string",
            FieldType::Number { integer: true, .. } => "integer",
            FieldType::Number { .. } => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array { .. } => "array",
            FieldType::Object(_) => "object",
        }
    }

    /// Render this type as a JSON schema fragment.
    pub fn to_json_schema(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), json!(self.type_name()));
        match self {
            FieldType::String {
                min_length,
                max_length,
            } => {
                if let Some(n) = min_length {
                    map.insert("minLength".into(), json!(n));
                }
                if let Some(n) = max_length {
                    map.insert("maxLength".into(), json!(n));
                }
            }
            FieldType::Number {
                minimum, maximum, ..
            } => {
                if let Some(n) = minimum {
                    map.insert("minimum".into(), json!(n));
                }
                if let Some(n) = maximum {
                    map.insert("maximum".into(), json!(n));
                }
            }
            FieldType::Boolean => {}
            FieldType::Media { kind } => {
                map.insert("format".into(), json!("data-url"));
                map.insert(
                    "contentMediaType".into(),
                    json!(format!("{}*", kind.mime_prefix())),
                );
            }
            FieldType::Array {
                items,
                min_items,
                max_items,
            } => {
                map.insert("items".into(), items.to_json_schema());
                if let Some(n) = min_items {
                    map.insert("minItems".into(), json!(n));
                }
                if let Some(n) = max_items {
                    map.insert("maxItems".into(), json!(n));
                }
            }
            FieldType::Object(schema) => return schema.to_json_schema(),
        }
        map.into()
    }
}

/// One named field of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub description: Option<String>,
    pub required: bool,
}

/// A named, ordered set of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    name: String,
    description: Option<String>,
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required field. Re-declaring a name replaces the earlier field.
    pub fn field(self, name: impl Into<String>, ty: FieldType, description: &str) -> Self {
        self.push(name.into(), ty, description, true)
    }

    pub fn optional_field(self, name: impl Into<String>, ty: FieldType, description: &str) -> Self {
        self.push(name.into(), ty, description, false)
    }

    fn push(mut self, name: String, ty: FieldType, description: &str, required: bool) -> Self {
        let field = Field {
            name,
            ty,
            description: (!description.is_empty()).then(|| description.to_string()),
            required,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Render as a JSON schema object (properties in declaration order).
    pub fn to_json_schema(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), json!("object"));
        map.insert("title".into(), json!(self.name));
        if let Some(desc) = &self.description {
            map.insert("description".into(), json!(desc));
        }

        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = field.ty.to_json_schema();
            if let (Some(desc), Value::Object(obj)) = (&field.description, &mut prop) {
                obj.insert("description".into(), json!(desc));
            }
            properties.insert(field.name.clone(), prop);
        }
        map.insert("properties".into(), properties.into());

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        if !required.is_empty() {
            map.insert("required".into(), json!(required));
        }
        map.into()
    }
}

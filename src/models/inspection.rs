//! Inspection data models.
//!
//! These are the plain-data descriptors handed to the code emitter. They are
//! serialized camelCase because the emitter's templates consume them as-is.

use serde::{Deserialize, Serialize};

/// Host-language category of a vendor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Number,
    Boolean,
    Date,
    String,
    Binary,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::String => "string",
            Self::Binary => "binary",
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Portable description of one vendor type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub native_type: SemanticType,
    /// Driver type constructor expression, e.g. `VarChar(50)`.
    pub wire_type: String,
    /// Human-readable SQL type, e.g. `varchar(50)`.
    pub display_type: String,
}

impl TypeDescriptor {
    pub fn new(
        native_type: SemanticType,
        wire_type: impl Into<String>,
        display_type: impl Into<String>,
    ) -> Self {
        Self {
            native_type,
            wire_type: wire_type.into(),
            display_type: display_type.into(),
        }
    }
}

/// A routine parameter or result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    /// `None` for the return value and for unnamed result columns.
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_descriptor: TypeDescriptor,
    pub optional: bool,
}

/// Parameter or result signature of one routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineInspection {
    /// No parameters (or no result columns).
    pub is_empty_type: bool,
    /// Exactly one entry without a name (`None` or empty).
    pub is_plain_type: bool,
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RoutineInspection {
    /// Classify a list of attributes as empty, plain or structured.
    pub fn from_attributes(attributes: Vec<AttributeDescriptor>) -> Self {
        let is_empty_type = attributes.is_empty();
        let is_plain_type = attributes.len() == 1
            && attributes[0].name.as_deref().is_none_or(str::is_empty);
        Self {
            is_empty_type,
            is_plain_type,
            attributes,
            error_message: None,
        }
    }

    /// Inspection that could not be completed, carrying only the reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A routine discovered in the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineSignature {
    pub name: String,
}

/// Full inspection result for one routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectedRoutine {
    pub name: String,
    pub parameters: RoutineInspection,
    pub results: RoutineInspection,
}

/// Everything a generation run produced for the emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub routines: Vec<InspectedRoutine>,
    /// Every routine listed by the catalog, inspected or not.
    pub routine_names: Vec<String>,
    /// Routines left out because they use an unsupported type.
    pub skipped: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attribute(name: Option<&str>) -> AttributeDescriptor {
        AttributeDescriptor {
            name: name.map(str::to_string),
            type_descriptor: TypeDescriptor::new(SemanticType::Number, "Int()", "int"),
            optional: false,
        }
    }

    #[test]
    fn test_empty_inspection() {
        let inspection = RoutineInspection::from_attributes(Vec::new());
        assert!(inspection.is_empty_type);
        assert!(!inspection.is_plain_type);
    }

    #[test]
    fn test_plain_inspection() {
        let inspection = RoutineInspection::from_attributes(vec![attribute(None)]);
        assert!(!inspection.is_empty_type);
        assert!(inspection.is_plain_type);

        let named = RoutineInspection::from_attributes(vec![attribute(Some("id"))]);
        assert!(!named.is_plain_type);
    }

    #[test]
    fn test_single_empty_name_is_plain() {
        let inspection = RoutineInspection::from_attributes(vec![attribute(Some(""))]);
        assert!(inspection.is_plain_type);

        let two = RoutineInspection::from_attributes(vec![attribute(None), attribute(None)]);
        assert!(!two.is_plain_type);
    }

    #[test]
    fn test_serialized_shape() {
        let inspection = RoutineInspection::from_attributes(vec![attribute(Some("id"))]);
        let value = serde_json::to_value(&inspection).unwrap();
        assert_eq!(
            value,
            json!({
                "isEmptyType": false,
                "isPlainType": false,
                "attributes": [{
                    "name": "id",
                    "type": {"nativeType": "number", "wireType": "Int()", "displayType": "int"},
                    "optional": false
                }]
            })
        );
    }

    #[test]
    fn test_failed_inspection_keeps_message() {
        let inspection = RoutineInspection::failed("boom");
        assert!(!inspection.is_empty_type);
        assert!(inspection.attributes.is_empty());
        let value = serde_json::to_value(&inspection).unwrap();
        assert_eq!(value["errorMessage"], "boom");
    }
}

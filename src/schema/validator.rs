//! Rendering of typed validators into `$jsonSchema` documents

use bson::{doc, Bson, Document};
use record_types::{FieldRule, Validator};

/// `{ $jsonSchema: { bsonType: "object", required: [...], properties: {...} } }`
pub fn render_validator(validator: &Validator) -> Document {
    let mut schema = doc! { "bsonType": "object" };
    if !validator.required.is_empty() {
        schema.insert("required", validator.required.clone());
    }
    schema.insert("properties", render_properties(&validator.properties));
    doc! { "$jsonSchema": schema }
}

fn render_properties(rules: &[FieldRule]) -> Document {
    let mut properties = Document::new();
    for rule in rules {
        properties.insert(rule.name.clone(), render_field(rule));
    }
    properties
}

fn render_field(rule: &FieldRule) -> Document {
    let mut field = Document::new();
    match rule.types.as_slice() {
        [] => {}
        [single] => {
            field.insert("bsonType", single.as_str());
        }
        many => {
            let names: Vec<Bson> = many.iter().map(|t| Bson::from(t.as_str())).collect();
            field.insert("bsonType", names);
        }
    }
    if !rule.enumeration.is_empty() {
        field.insert("enum", rule.enumeration.clone());
    }
    if let Some(pattern) = &rule.pattern {
        field.insert("pattern", pattern.clone());
    }
    if let Some(minimum) = rule.minimum {
        // Integral minimums render as integers so they compare cleanly against int fields
        if minimum.fract() == 0.0 && minimum.abs() <= f64::from(i32::MAX) {
            field.insert("minimum", minimum as i32);
        } else {
            field.insert("minimum", minimum);
        }
    }
    if !rule.properties.is_empty() {
        field.insert("properties", render_properties(&rule.properties));
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_types::BsonType;

    #[test]
    fn test_render_validator_shape() {
        let validator = Validator::new(
            &["user_id", "type"],
            vec![
                FieldRule::typed("user_id", BsonType::String),
                FieldRule::one_of("type", &["debtor", "creditor"]),
                FieldRule::typed("amount_owed", BsonType::Number).with_minimum(0.0),
                FieldRule::nullable("updated_at", BsonType::Date),
            ],
        );
        let rendered = render_validator(&validator);
        let schema = rendered.get_document("$jsonSchema").unwrap();

        assert_eq!(schema.get_str("bsonType").unwrap(), "object");
        assert_eq!(
            schema.get_array("required").unwrap(),
            &vec![Bson::from("user_id"), Bson::from("type")]
        );

        let properties = schema.get_document("properties").unwrap();
        assert_eq!(
            properties.get_document("user_id").unwrap(),
            &doc! { "bsonType": "string" }
        );
        assert_eq!(
            properties.get_document("type").unwrap(),
            &doc! { "enum": ["debtor", "creditor"] }
        );
        assert_eq!(
            properties.get_document("amount_owed").unwrap(),
            &doc! { "bsonType": "number", "minimum": 0 }
        );
        assert_eq!(
            properties.get_document("updated_at").unwrap(),
            &doc! { "bsonType": ["date", "null"] }
        );
    }

    #[test]
    fn test_render_nested_properties() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::nullable("business_details", BsonType::Object)
                .with_properties(vec![FieldRule::typed("name", BsonType::String)])],
        );
        let rendered = render_validator(&validator);
        let schema = rendered.get_document("$jsonSchema").unwrap();
        assert!(!schema.contains_key("required"));

        let details = schema
            .get_document("properties")
            .and_then(|p| p.get_document("business_details"))
            .unwrap();
        assert_eq!(
            details.get_document("properties").unwrap(),
            &doc! { "name": { "bsonType": "string" } }
        );
    }
}

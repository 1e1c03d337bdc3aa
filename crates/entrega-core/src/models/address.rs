use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Home,
    Work,
    Other,
}

/// Row from the `addresses` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub street: Option<String>,
    pub commune: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<AddressKind>,
}

impl Address {
    /// Single-line rendering for order forms and receipts.
    pub fn display_line(&self) -> String {
        let parts: Vec<&str> = [self.street.as_deref(), self.commune.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AddressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commune: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AddressKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_row() {
        let json = r#"{
            "id": "a-1",
            "user_id": "u-1",
            "street": "Av. Providencia 1234",
            "commune": "Providencia",
            "city": "Santiago",
            "is_default": true,
            "alias": "Casa",
            "type": "home"
        }"#;
        let address: Address = serde_json::from_str(json).expect("parse address");
        assert_eq!(address.kind, Some(AddressKind::Home));
        assert!(address.is_default);
        assert_eq!(
            address.display_line(),
            "Av. Providencia 1234, Providencia, Santiago"
        );
    }

    #[test]
    fn test_display_line_skips_missing_parts() {
        let address = Address {
            id: "a-2".to_string(),
            user_id: "u-1".to_string(),
            street: Some("Merced 456".to_string()),
            commune: None,
            city: Some("Santiago".to_string()),
            is_default: false,
            alias: None,
            kind: None,
        };
        assert_eq!(address.display_line(), "Merced 456, Santiago");
    }

    #[test]
    fn test_update_renames_kind_to_type() {
        let update = AddressUpdate {
            kind: Some(AddressKind::Work),
            is_default: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).expect("serialize update");
        assert_eq!(json["type"], "work");
        assert!(json.get("kind").is_none());
        assert!(json.get("street").is_none());
    }
}

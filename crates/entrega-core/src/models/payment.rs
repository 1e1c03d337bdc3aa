use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Visa,
    Mastercard,
    Amex,
    Cash,
}

impl PaymentKind {
    pub fn is_card(&self) -> bool {
        !matches!(self, PaymentKind::Cash)
    }
}

/// Row from the `payment_methods` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    pub last4: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl PaymentMethod {
    /// Masked label for receipts, e.g. "visa •••• 4242" or "cash".
    pub fn display_label(&self) -> String {
        match (&self.kind, self.last4.as_deref()) {
            (PaymentKind::Cash, _) | (_, None) => self.kind_label().to_string(),
            (_, Some(last4)) => format!("{} \u{2022}\u{2022}\u{2022}\u{2022} {}", self.kind_label(), last4),
        }
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            PaymentKind::Visa => "visa",
            PaymentKind::Mastercard => "mastercard",
            PaymentKind::Amex => "amex",
            PaymentKind::Cash => "cash",
        }
    }
}

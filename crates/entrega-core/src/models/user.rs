use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Application role of a signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Merchant,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Merchant => "merchant",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loyalty tier, stored on the profile row with its Spanish wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyLevel {
    #[serde(rename = "Bronce")]
    Bronze,
    #[serde(rename = "Plata")]
    Silver,
    #[serde(rename = "Oro")]
    Gold,
}

impl LoyaltyLevel {
    /// Points required to reach this tier.
    pub fn threshold(&self) -> i64 {
        match self {
            LoyaltyLevel::Bronze => 0,
            LoyaltyLevel::Silver => 1_000,
            LoyaltyLevel::Gold => 5_000,
        }
    }

    /// Points at which the next tier begins (Gold tops out at 10,000).
    pub fn next_threshold(&self) -> i64 {
        match self {
            LoyaltyLevel::Bronze => 1_000,
            LoyaltyLevel::Silver => 5_000,
            LoyaltyLevel::Gold => 10_000,
        }
    }

    /// Fraction of the way from this tier to the next, clamped to [0, 1].
    pub fn progress(&self, points: i64) -> f64 {
        let lower = self.threshold();
        let upper = self.next_threshold();
        let fraction = (points - lower) as f64 / (upper - lower) as f64;
        fraction.clamp(0.0, 1.0)
    }

    /// Tier earned by a given points balance.
    pub fn for_points(points: i64) -> Self {
        if points >= LoyaltyLevel::Gold.threshold() {
            LoyaltyLevel::Gold
        } else if points >= LoyaltyLevel::Silver.threshold() {
            LoyaltyLevel::Silver
        } else {
            LoyaltyLevel::Bronze
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoyaltyLevel::Bronze => "Bronze",
            LoyaltyLevel::Silver => "Silver",
            LoyaltyLevel::Gold => "Gold",
        }
    }
}

/// Application-level profile row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub points: i64,
    pub level: Option<LoyaltyLevel>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Loyalty tier for display: the stored tier, or the one implied by points.
    pub fn loyalty_level(&self) -> LoyaltyLevel {
        self.level.unwrap_or_else(|| LoyaltyLevel::for_points(self.points))
    }
}

/// Optional attributes attached to the auth identity at sign-up and kept
/// under the identity's metadata map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Identity record returned by the auth endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// The signed-in user exposed by the session context: the auth identity
/// merged with the application profile, which may be missing when the
/// profile fetch fails or the row has not been created yet.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub identity: AuthIdentity,
    pub profile: Option<UserProfile>,
}

impl SessionUser {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn email(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .or(self.identity.email.as_deref())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .or(self.identity.user_metadata.name.as_deref())
    }

    /// Role from the profile row when present (authoritative), else from
    /// the identity metadata, defaulting to customer.
    pub fn role(&self) -> Role {
        self.profile
            .as_ref()
            .and_then(|p| p.role)
            .or(self.identity.user_metadata.role)
            .unwrap_or(Role::Customer)
    }
}

/// Editable profile fields shared by the auth metadata update and the
/// profile-row update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

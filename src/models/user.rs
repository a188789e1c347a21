use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub avatar_url: Option<String>,
    /// 0 when unknown
    pub age: i32,
    pub country: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            age: self.age,
            country: self.country.clone(),
        }
    }
}

/// Demographic input of the eligibility filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: i32,
    pub country: String,
}

impl UserProfile {
    pub fn known_age(&self) -> Option<i32> {
        Some(self.age).filter(|age| *age != 0)
    }

    pub fn known_country(&self) -> Option<&str> {
        Some(self.country.as_str()).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

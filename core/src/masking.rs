/// Privacy-preserving display names for conversation counterparts.
///
/// List rows and the chat header both go through these functions, so they
/// must stay pure: same input, same output.
use crate::messenger_types::CounterpartIdentity;
use crate::models::{BusinessProfile, CourierProfile, Role};

const ELLIPSIS: &str = "...";

/// Uppercased first character of `s`. Some characters uppercase to more than
/// one char, so this returns a `String`.
fn upper_initial(s: &str) -> Option<String> {
    s.chars().next().map(|c| c.to_uppercase().collect())
}

/// `"Ahmet Yılmaz"` → `"Ahmet Y."`. Falls back to `"Kurye"` when both parts
/// are blank.
pub fn mask_courier_name(first_name: &str, last_name: Option<&str>) -> String {
    let first = first_name.trim();
    let initial = last_name.map(str::trim).and_then(upper_initial);

    match (first.is_empty(), initial) {
        (true, None) => Role::Courier.label().to_string(),
        (true, Some(initial)) => format!("{}.", initial),
        (false, None) => first.to_string(),
        (false, Some(initial)) => format!("{} {}.", first, initial),
    }
}

/// `"Engin Has Lahmacun"` → `"E... H... L..."`. Falls back to `"İşletme"`
/// when blank.
pub fn mask_business_name(business_name: &str) -> String {
    let words: Vec<String> = business_name
        .split_whitespace()
        .filter_map(upper_initial)
        .map(|initial| format!("{}{}", initial, ELLIPSIS))
        .collect();

    if words.is_empty() {
        Role::Business.label().to_string()
    } else {
        words.join(" ")
    }
}

pub fn business_identity(profile: &BusinessProfile) -> CounterpartIdentity {
    CounterpartIdentity {
        masked_name: mask_business_name(&profile.business_name),
        avatar_url: profile.logo_url.clone(),
        role_label: Role::Business.label().to_string(),
    }
}

pub fn courier_identity(profile: &CourierProfile) -> CounterpartIdentity {
    CounterpartIdentity {
        masked_name: mask_courier_name(&profile.first_name, profile.last_name.as_deref()),
        avatar_url: profile.avatar_url.clone(),
        role_label: Role::Courier.label().to_string(),
    }
}

/// Identity shown when the counterpart's profile row is gone.
pub fn placeholder_identity(role: Role) -> CounterpartIdentity {
    CounterpartIdentity {
        masked_name: role.label().to_string(),
        avatar_url: None,
        role_label: role.label().to_string(),
    }
}

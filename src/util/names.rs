//! Generated identities handed out at connect time

use rand::Rng;
use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "Brave", "Swift", "Silent", "Crimson", "Lucky", "Rusty", "Frozen", "Wild", "Hidden", "Bold",
];

const NOUNS: &[&str] = &[
    "Falcon", "Otter", "Comet", "Badger", "Raven", "Viper", "Lynx", "Rocket", "Golem", "Wisp",
];

/// A random provisional username such as `SwiftOtter4821`.
/// Uniqueness is the caller's job (checked against the registry).
pub fn generate_random_username() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    format!("{}{}{:04}", adjective, noun, rng.gen_range(0..10_000))
}

/// Opaque per-session secret the client must echo on every request
pub fn generate_unique_authentication_string() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_alphanumeric() {
        for _ in 0..50 {
            let name = generate_random_username();
            assert!(!name.is_empty());
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn auth_strings_do_not_repeat() {
        let a = generate_unique_authentication_string();
        let b = generate_unique_authentication_string();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}

//! Password policy applied when users pick a new password.

/// Minimum accepted password length, in characters.
pub const MIN_LENGTH: usize = 8;

/// Shortest username or email fragment considered for the similarity check.
const MIN_SIMILARITY_FRAGMENT: usize = 3;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "1234567890", "password", "password1",
    "password123", "qwerty", "qwerty123", "qwertyuiop", "abc123", "111111",
    "123123", "1q2w3e4r", "1qaz2wsx", "admin123", "administrator", "letmein",
    "welcome", "welcome1", "iloveyou", "monkey", "dragon", "football",
    "baseball", "sunshine", "princess", "trustno1", "superman", "changeme",
    "passw0rd", "p@ssw0rd", "starwars", "whatever", "master", "shadow",
];

/// Check a candidate password against the policy.
///
/// Returns one human-readable message per violated rule; an empty list means
/// the password is acceptable.
pub fn validate_password(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }

    let lowered = password.to_lowercase();

    if too_similar(&lowered, username) {
        errors.push("The password is too similar to the username.".to_string());
    } else if let Some((local, _)) = email.split_once('@')
        && too_similar(&lowered, local)
    {
        errors.push("The password is too similar to the email address.".to_string());
    }

    if COMMON_PASSWORDS.contains(&lowered.trim()) {
        errors.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    errors
}

fn too_similar(lowered_password: &str, attribute: &str) -> bool {
    let attribute = attribute.trim().to_lowercase();
    attribute.chars().count() >= MIN_SIMILARITY_FRAGMENT && lowered_password.contains(&attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_reasonable_password() {
        assert!(validate_password("Tangerine-Orbit-42", "alice", "alice@example.com").is_empty());
    }

    #[test]
    fn test_rejects_short() {
        let errors = validate_password("x7$kq", "alice", "");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("too short"));
    }

    #[test]
    fn test_rejects_numeric_and_common() {
        let errors = validate_password("12345678", "alice", "");
        assert!(errors.iter().any(|e| e.contains("entirely numeric")));
        assert!(errors.iter().any(|e| e.contains("too common")));

        let errors = validate_password("Password123", "alice", "");
        assert_eq!(errors, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn test_rejects_similar_to_username_or_email() {
        let errors = validate_password("MyNameIsAlice!", "alice", "");
        assert_eq!(errors, vec!["The password is too similar to the username.".to_string()]);

        let errors = validate_password("wonderland-jdoe", "alice", "jdoe@example.com");
        assert_eq!(
            errors,
            vec!["The password is too similar to the email address.".to_string()]
        );

        // Very short usernames are ignored
        assert!(validate_password("bo-and-the-rest", "bo", "").is_empty());
    }
}

//! Synthetic identities for registration and login cases.

use crate::runner::task::UserRecord;
use fake::faker::internet::en::{Password, SafeEmail, Username};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const INVALID_EMAILS: &[&str] = &[
    "plainaddress",
    "@missingusername.com",
    "username@.com",
    "username@domain..com",
    "username@.domain.com",
    "username@domain",
    "username.@domain.com",
    ".username@domain.com",
    "username#@domain.com",
    "invalid.email",
];

const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub struct DataGenerator {
    rng: StdRng,
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DataGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A valid, unique user.
    ///
    /// Faker output repeats often enough to trip the duplicate-email check
    /// inside one batch, so the username and email carry a random suffix.
    pub fn user(&mut self) -> UserRecord {
        let suffix: String = (0..8)
            .map(|_| char::from_digit(self.rng.gen_range(0..36), 36).unwrap_or('x'))
            .collect();

        let user_name: String = Username().fake_with_rng(&mut self.rng);
        let email: String = SafeEmail().fake_with_rng(&mut self.rng);
        let email = match email.split_once('@') {
            Some((local, domain)) => format!("{}.{}@{}", local, suffix, domain),
            None => format!("{}.{}@example.com", email, suffix),
        };

        UserRecord {
            full_name: Name().fake_with_rng(&mut self.rng),
            user_name: format!("{}_{}", user_name, suffix),
            email,
            password: Password(12..13).fake_with_rng(&mut self.rng),
            phone: self.digits(10),
        }
    }

    /// A valid user whose email is malformed
    pub fn user_with_invalid_email(&mut self) -> UserRecord {
        let email = INVALID_EMAILS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("plainaddress");
        UserRecord {
            email: email.to_string(),
            ..self.user()
        }
    }

    /// One of the known-bad registration payloads
    pub fn invalid_user(&mut self) -> UserRecord {
        let base = self.user();
        let candidates = [
            UserRecord {
                full_name: String::new(),
                user_name: String::new(),
                email: String::new(),
                password: String::new(),
                phone: String::new(),
            },
            UserRecord {
                email: "invalid.email".to_string(),
                ..base.clone()
            },
            UserRecord {
                full_name: "A".repeat(256),
                user_name: "U".repeat(128),
                email: format!("{}@test.com", "a".repeat(200)),
                password: "P".repeat(128),
                phone: "1".repeat(20),
            },
            UserRecord {
                full_name: "Test User !@#$%".to_string(),
                user_name: "test_user@123".to_string(),
                email: "test+user@example.com".to_string(),
                password: "pass!@#$%^&*()".to_string(),
                phone: "+1-234-567-8900".to_string(),
            },
            UserRecord {
                full_name: "测试用户".to_string(),
                user_name: "测试".to_string(),
                email: "test@example.com".to_string(),
                password: "パスワード123".to_string(),
                phone: "1234567890".to_string(),
            },
        ];
        let index = self.rng.gen_range(0..candidates.len());
        candidates[index].clone()
    }

    /// Password drawn from one of several character classes
    pub fn password_variation(&mut self) -> String {
        match self.rng.gen_range(0..5) {
            0 => self.from_alphabet(b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ", 8),
            1 => self.digits(8),
            2 => self.from_alphabet(PUNCTUATION, 8),
            3 => self.from_alphabet(
                b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
                16,
            ),
            _ => (0..12)
                .map(|_| char::from(self.rng.gen_range(0x20u8..0x7f)))
                .collect(),
        }
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn digits(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.rng.gen_range(0..10u8)))
            .collect()
    }

    fn from_alphabet(&mut self, alphabet: &[u8], len: usize) -> String {
        (0..len)
            .map(|_| char::from(alphabet[self.rng.gen_range(0..alphabet.len())]))
            .collect()
    }
}

/// Credentials that should never log in
pub fn invalid_credentials() -> Vec<UserRecord> {
    vec![
        UserRecord::credentials("nonexistent@example.com", "wrongpass"),
        UserRecord::credentials("invalid.email", "password123"),
        UserRecord::credentials("", "password123"),
        UserRecord::credentials("user@example.com", ""),
        UserRecord::credentials("user@example.com", "short"),
    ]
}

/// Credentials with quoting and separator characters
pub fn special_credentials() -> Vec<UserRecord> {
    vec![
        UserRecord::credentials("user+test@example.com", "pass'word123"),
        UserRecord::credentials("user@sub.example.com", "pass\"word123"),
        UserRecord::credentials("user.name@example.com", "pass@word123"),
    ]
}

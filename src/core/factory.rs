use crate::core::registry::{Registries, UniquenessRegistry};
use crate::domain::model::{AccountRequest, AccountType, CustomerRequest};
use crate::utils::error::SeederError;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub const MAX_KEY_ATTEMPTS: usize = 10;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas",
    "Sarah", "Priya", "Arjun", "Ananya", "Rahul", "Oliver", "Amelia", "Harry", "Isla",
    "Noah", "Emma", "Liam", "Sophia",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Wilson",
    "Anderson", "Taylor", "Thomas", "Moore", "Martin", "Jackson", "Sharma", "Patel", "Iyer",
    "Reddy", "Gupta", "Evans", "Walker", "Wright", "Roberts", "O'Brien", "Murphy",
];

const EMAIL_DOMAINS: &[&str] = &[
    "example.com",
    "mail.test",
    "inbox.example.org",
    "corp.example.net",
    "seeded.dev",
];

const PHONE_PREFIXES: &[&str] = &["+1-", "+91-", "+44-", ""];

/// Produces randomized customer and account requests.
///
/// Output is not reproducible: there is no seed control, which is acceptable
/// for throwaway load-test data. Uniqueness of emails and account numbers is
/// checked against the injected registries.
pub struct SyntheticRecordFactory {
    registries: Registries,
    fallbacks: AtomicUsize,
}

impl SyntheticRecordFactory {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            fallbacks: AtomicUsize::new(0),
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Keys that had to be synthesized after the retry bound was exhausted.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn next_customer(&self) -> CustomerRequest {
        let mut rng = rand::thread_rng();
        let first = pick(&mut rng, FIRST_NAMES);
        let last = pick(&mut rng, LAST_NAMES);

        let email = self.unique_key(
            &self.registries.emails,
            || candidate_email(first, last),
            fallback_email,
        );

        CustomerRequest {
            name: format!("{} {}", first, last),
            email,
            phone: random_phone(&mut rng),
        }
    }

    pub fn next_account(&self, customer_id: i64) -> AccountRequest {
        let mut rng = rand::thread_rng();
        let account_type = *AccountType::ALL
            .choose(&mut rng)
            .unwrap_or(&AccountType::Savings);

        let account_number = self.unique_key(
            &self.registries.account_numbers,
            candidate_account_number,
            fallback_account_number,
        );

        AccountRequest {
            account_number,
            account_type,
            balance: random_balance(&mut rng, account_type.balance_range()),
            customer_id,
        }
    }

    fn unique_key(
        &self,
        registry: &UniquenessRegistry,
        mut candidate: impl FnMut() -> String,
        fallback: impl FnOnce() -> String,
    ) -> String {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = candidate();
            if registry.reserve(&key) {
                return key;
            }
        }

        let exhausted = SeederError::UniquenessExhausted {
            kind: registry.kind().to_string(),
            attempts: MAX_KEY_ATTEMPTS,
        };
        tracing::warn!("{}, falling back to a synthesized key", exhausted);
        self.fallbacks.fetch_add(1, Ordering::Relaxed);

        let key = fallback();
        registry.reserve(&key);
        key
    }
}

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn candidate_email(first: &str, last: &str) -> String {
    let mut rng = rand::thread_rng();
    let local: String = format!("{}.{}", first, last)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    format!(
        "{}{}@{}",
        local.to_lowercase(),
        rng.gen_range(1..10_000),
        pick(&mut rng, EMAIL_DOMAINS)
    )
}

fn fallback_email() -> String {
    let mut rng = rand::thread_rng();
    format!("{}@{}", Uuid::new_v4(), pick(&mut rng, EMAIL_DOMAINS))
}

fn candidate_account_number() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..10)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("ACC{}", digits)
}

fn fallback_account_number() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ACC{}", &hex[..20])
}

fn random_phone<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}{}-{}-{}",
        pick(rng, PHONE_PREFIXES),
        rng.gen_range(100..999),
        rng.gen_range(100..999),
        rng.gen_range(1000..9999)
    )
}

/// Uniform draw in `[min, max)` rounded to cents.
fn random_balance<R: Rng>(rng: &mut R, (min, max): (i64, i64)) -> Decimal {
    let raw: f64 = rng.gen_range(min as f64..max as f64);
    let value = Decimal::try_from(raw).unwrap_or_else(|_| Decimal::from(min));
    round_half_up(value)
}

/// Two fractional digits, ties away from zero, always scale 2.
pub fn round_half_up(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

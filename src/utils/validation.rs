use crate::utils::error::{Result, SeederError};
use url::Url;

pub const MAX_CUSTOMERS_PER_RUN: usize = 50_000;
pub const MAX_ACCOUNTS_PER_CUSTOMER: usize = 10;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(SeederError::validation(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(SeederError::validation(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(SeederError::validation(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SeederError::validation(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(SeederError::validation(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(SeederError::validation(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(SeederError::validation(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

pub fn validate_customer_count(count: usize) -> Result<()> {
    validate_range("customer_count", count, 1, MAX_CUSTOMERS_PER_RUN)
}

/// Bounds are inclusive on both ends.
pub fn validate_account_range(min_per_customer: usize, max_per_customer: usize) -> Result<()> {
    validate_positive_number("min_accounts_per_customer", min_per_customer, 1)?;
    validate_positive_number("max_accounts_per_customer", max_per_customer, 1)?;

    if min_per_customer > max_per_customer {
        return Err(SeederError::validation(
            "min_accounts_per_customer",
            min_per_customer,
            format!("Must not exceed max_accounts_per_customer ({})", max_per_customer),
        ));
    }

    validate_range(
        "max_accounts_per_customer",
        max_per_customer,
        1,
        MAX_ACCOUNTS_PER_CUSTOMER,
    )
}

//! Utility functions for configuration parsing and account loading.
//!
//! This module provides helpers for:
//! - Reading and parsing environment variables
//! - Scaling decimal amounts to the token's smallest unit
//! - Loading the account list

use alloy::primitives::Address;
use alloy_primitives::utils::parse_units;
use serde::Deserialize;
use std::{path::Path, str::FromStr, time::Duration};

use crate::{
    error::{PipelineError, Result},
    types::Account,
};

/// Reads a required environment variable.
pub fn env_var(name: &str) -> Result<String> {
    dotenv::var(name).map_err(|_| PipelineError::EnvVarNotFound(name.to_string()))
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset. A set but unparsable value is an error.
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match dotenv::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| PipelineError::InvalidEnvVar(format!("{} has an invalid value", name))),
        Err(_) => Ok(default),
    }
}

pub fn parse_address(name: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::InvalidEnvVar(format!("{} is not a valid address", name)))
}

pub fn env_address(name: &str) -> Result<Address> {
    parse_address(name, &env_var(name)?)
}

/// Reads a humantime duration such as `3s` or `1m 30s`.
pub fn env_duration(name: &str, default: Duration) -> Result<Duration> {
    match dotenv::var(name) {
        Ok(value) => humantime::parse_duration(value.trim()).map_err(|e| {
            PipelineError::InvalidEnvVar(format!("{} is not a valid duration: {}", name, e))
        }),
        Err(_) => Ok(default),
    }
}

/// Scales a non-negative decimal amount (`"0.0001"`) to the smallest unit.
pub fn parse_amount(value: &str, decimals: u8) -> Result<u128> {
    let parsed = parse_units(value.trim(), decimals).map_err(|e| {
        PipelineError::Configuration(format!("Invalid amount {:?}: {}", value, e))
    })?;
    if parsed.is_negative() {
        return Err(PipelineError::Configuration(format!(
            "Amount {:?} must not be negative",
            value
        )));
    }
    u128::try_from(parsed.get_absolute()).map_err(|_| {
        PipelineError::Configuration(format!("Amount {:?} is too large", value))
    })
}

/// Scales a signed decimal offset (`"-0.00001"`) to the smallest unit.
pub fn parse_offset(value: &str, decimals: u8) -> Result<i128> {
    let parsed = parse_units(value.trim(), decimals).map_err(|e| {
        PipelineError::Configuration(format!("Invalid amount {:?}: {}", value, e))
    })?;
    let magnitude = i128::try_from(parsed.get_absolute()).map_err(|_| {
        PipelineError::Configuration(format!("Amount {:?} is too large", value))
    })?;
    Ok(if parsed.is_negative() {
        -magnitude
    } else {
        magnitude
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountEntry {
    Key(String),
    Keyed { private_key: String },
}

/// Parses a JSON array of private keys, either bare strings or
/// `{ "private_key": "0x..." }` objects.
pub fn parse_accounts_json(json: &str) -> Result<Vec<Account>> {
    let entries: Vec<AccountEntry> = serde_json::from_str(json)
        .map_err(|e| PipelineError::Configuration(format!("Invalid accounts file: {}", e)))?;

    entries
        .into_iter()
        .map(|entry| match entry {
            AccountEntry::Key(key) | AccountEntry::Keyed { private_key: key } => {
                Account::from_private_key(&key)
            }
        })
        .collect()
}

/// Parses a comma separated list of private keys.
pub fn parse_accounts_list(list: &str) -> Result<Vec<Account>> {
    list.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(Account::from_private_key)
        .collect()
}

/// Loads accounts from `ACCOUNTS_FILE` if set, otherwise from `ACCOUNTS`.
pub fn load_accounts_from_env() -> Result<Vec<Account>> {
    let accounts = match dotenv::var("ACCOUNTS_FILE") {
        Ok(path) => {
            let json = std::fs::read_to_string(Path::new(path.trim()))?;
            parse_accounts_json(&json)?
        }
        Err(_) => parse_accounts_list(&env_var("ACCOUNTS")?)?,
    };

    if accounts.is_empty() {
        return Err(PipelineError::Configuration(
            "No accounts configured".to_string(),
        ));
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn scales_decimal_amounts() {
        assert_eq!(parse_amount("0.0001", 18).unwrap(), 100_000_000_000_000);
        assert_eq!(parse_amount("0.00009", 18).unwrap(), 90_000_000_000_000);
        assert_eq!(parse_amount("1.5", 6).unwrap(), 1_500_000);
    }

    #[test]
    fn rejects_negative_and_garbage_amounts() {
        assert!(parse_amount("-1", 18).is_err());
        assert!(parse_amount("abc", 18).is_err());
    }

    #[test]
    fn offsets_keep_their_sign() {
        assert_eq!(parse_offset("-0.00001", 18).unwrap(), -10_000_000_000_000);
        assert_eq!(parse_offset("0.00001", 18).unwrap(), 10_000_000_000_000);
        assert_eq!(parse_offset("0", 18).unwrap(), 0);
        assert!(parse_offset("-abc", 18).is_err());
    }

    #[test]
    fn parses_key_lists() {
        let accounts = parse_accounts_list(&format!("{}, {},", KEY_A, KEY_B)).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_ne!(accounts[0].address(), accounts[1].address());
    }

    #[test]
    fn parses_both_json_shapes() {
        let json = format!(r#"["{}", {{"private_key": "{}"}}]"#, KEY_A, KEY_B);
        let accounts = parse_accounts_json(&json).unwrap();
        let listed = parse_accounts_list(&format!("{},{}", KEY_A, KEY_B)).unwrap();
        assert_eq!(accounts[0].address(), listed[0].address());
        assert_eq!(accounts[1].address(), listed[1].address());
    }

    #[test]
    fn bad_address_is_rejected() {
        assert!(parse_address("POOL_ADDRESS", "0x1234").is_err());
        assert!(parse_address(
            "POOL_ADDRESS",
            "0x0DcF98667c5400b7bc8De4ec2E4d03C5Cd11fA85"
        )
        .is_ok());
    }
}

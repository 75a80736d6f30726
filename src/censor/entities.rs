use std::{fmt, str::FromStr};

use async_trait::async_trait;
use regex::Regex;

use crate::{
    app_err, app_error,
    censor::{REPLACEMENT, Redactor},
    error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    CreditCard,
    Crypto,
    EmailAddress,
    IbanCode,
    PhoneNumber,
    MedicalLicense,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::CreditCard,
        EntityKind::Crypto,
        EntityKind::EmailAddress,
        EntityKind::IbanCode,
        EntityKind::PhoneNumber,
        EntityKind::MedicalLicense,
    ];

    fn name(self) -> &'static str {
        match self {
            EntityKind::CreditCard => "CREDIT_CARD",
            EntityKind::Crypto => "CRYPTO",
            EntityKind::EmailAddress => "EMAIL_ADDRESS",
            EntityKind::IbanCode => "IBAN_CODE",
            EntityKind::PhoneNumber => "PHONE_NUMBER",
            EntityKind::MedicalLicense => "MEDICAL_LICENSE",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            EntityKind::CreditCard => r"\b[0-9](?:[ \-]?[0-9]){12,18}\b",
            EntityKind::Crypto => {
                r"\b(?:bc1[ac-hj-np-z02-9]{11,71}|[13][a-km-zA-HJ-NP-Z1-9]{25,34})\b"
            }
            EntityKind::EmailAddress => {
                r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}"
            }
            EntityKind::IbanCode => r"\b[A-Z]{2}[0-9]{2}(?: ?[A-Z0-9]){11,30}\b",
            EntityKind::PhoneNumber => {
                r"(?:\+[0-9]{1,3}[\s.\-]?)?\(?\b[0-9]{2,4}\)?[\s.\-][0-9]{3,4}[\s.\-][0-9]{3,4}\b"
            }
            EntityKind::MedicalLicense => {
                r"\b[ABCDEFGHJKLMPRSTUXabcdefghjklmprstux][A-Za-z9][0-9]{7}\b"
            }
        }
    }

    fn is_valid(self, candidate: &str) -> bool {
        match self {
            EntityKind::CreditCard => luhn_valid(candidate),
            EntityKind::IbanCode => iban_valid(candidate),
            EntityKind::MedicalLicense => dea_valid(candidate),
            EntityKind::Crypto | EntityKind::EmailAddress | EntityKind::PhoneNumber => true,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match EntityKind::ALL.into_iter().find(|k| k.name() == s) {
            Some(kind) => Ok(kind),
            None => app_err!("Unknown entity kind: {s}"),
        }
    }
}

pub struct EntityScanner {
    recognizers: Vec<(EntityKind, Regex)>,
}

impl EntityScanner {
    pub fn new(kinds: &[EntityKind]) -> Result<Self, AppError> {
        let recognizers = kinds
            .iter()
            .map(|kind| {
                Regex::new(kind.pattern())
                    .map(|regex| (*kind, regex))
                    .map_err(|e| app_error!("Invalid {kind} pattern: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { recognizers })
    }

    // byte ranges, sorted and merged
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = self
            .recognizers
            .iter()
            .flat_map(|(kind, regex)| {
                regex
                    .find_iter(text)
                    .filter(move |m| kind.is_valid(m.as_str()))
                    .map(|m| (m.start(), m.end()))
            })
            .collect::<Vec<_>>();
        spans.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    pub fn censor(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end) in self.spans(text) {
            out.push_str(&text[cursor..start]);
            out.push_str(REPLACEMENT);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

#[async_trait]
impl Redactor for EntityScanner {
    async fn redact(&self, text: &str) -> Result<String, AppError> {
        Ok(self.censor(text))
    }
}

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn luhn_valid(candidate: &str) -> bool {
    let digits = digits(candidate);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| match i % 2 {
            0 => *d,
            _ if *d * 2 > 9 => *d * 2 - 9,
            _ => *d * 2,
        })
        .sum();
    sum % 10 == 0
}

fn iban_valid(candidate: &str) -> bool {
    let compact = candidate.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    if !compact.is_ascii() || !(15..=34).contains(&compact.len()) {
        return false;
    }
    let (head, tail) = compact.split_at(4);
    let mut remainder = 0u32;
    for c in tail.chars().chain(head.chars()) {
        let Some(value) = c.to_digit(36) else {
            return false;
        };
        let width = if value < 10 { 10 } else { 100 };
        remainder = (remainder * width + value) % 97;
    }
    remainder == 1
}

// two letters, six digits, one check digit
fn dea_valid(candidate: &str) -> bool {
    let d = digits(&candidate[2..]);
    if d.len() != 7 {
        return false;
    }
    let check = (d[0] + d[2] + d[4]) + 2 * (d[1] + d[3] + d[5]);
    check % 10 == d[6]
}

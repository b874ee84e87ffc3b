//! Identifier types and natural-number-aware ordering.
//!
//! Task ids are opaque strings, but the scheduler's tie-break (spec §4.B)
//! sorts them "numeric-aware" so `task-2` precedes `task-12`. [`natural_cmp`]
//! implements that by splitting each id into alternating runs of digits and
//! non-digits and comparing digit runs by numeric value.

use std::cmp::Ordering;

crate::define_id! {
    /// Local, stable-per-spawn identifier for an agent record.
    pub struct AgentLocalId;
}

crate::define_id! {
    /// Identifier for a task persisted in the task store.
    pub struct TaskId;
}

/// Generates new identifiers. Abstracted so tests can supply deterministic ids.
pub trait IdGen: Send + Sync {
    fn generate(&self) -> String;
}

/// Real id generator backed by a UUIDv4-shaped random string via `nanoid`.
#[derive(Debug, Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn generate(&self) -> String {
        nanoid::nanoid!(21)
    }
}

/// Returns the first 8 characters of an id, for compact logging.
pub fn short(id: &str) -> &str {
    if id.len() > 8 {
        &id[..8]
    } else {
        id
    }
}

/// Compares two ids the way the scheduler's tie-break requires: runs of
/// ASCII digits compare by numeric value, everything else compares
/// byte-for-byte. Falls back to `unsigned_cmp` on the whole string if a
/// numeric run overflows `u128` (treated as "very large").
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let a_num = take_digits(&mut ai);
                    let b_num = take_digits(&mut bi);
                    match a_num.cmp(&b_num) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                } else {
                    let ac = *ac;
                    let bc = *bc;
                    ai.next();
                    bi.next();
                    match ac.cmp(&bc) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u128 {
    let mut value: u128 = 0;
    while let Some(c) = it.peek() {
        if c.is_ascii_digit() {
            value = value.saturating_mul(10).saturating_add(c.to_digit(10).unwrap_or(0) as u128);
            it.next();
        } else {
            break;
        }
    }
    value
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;

//! Human-readable ticket numbers.
//!
//! Numbers look like `TKT-482913-K7Q`: the last six digits of the current
//! Unix time in milliseconds, then three random base-36 characters. They
//! are not guaranteed unique on their own; the `idx_ticket_number` index
//! is the arbiter and the ticket repository regenerates on collision.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Upper bound on generate-and-insert attempts for one ticket.
pub const MAX_TICKET_NUMBER_ATTEMPTS: u32 = 5;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Produces candidate ticket numbers.
pub trait TicketNumberSource: Send + Sync {
    fn next_number(&self) -> String;
}

/// Time fragment plus random suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRandomSource;

impl TicketNumberSource for TimeRandomSource {
    fn next_number(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format_ticket_number(millis, &random_suffix())
    }
}

pub fn format_ticket_number(unix_millis: u128, suffix: &str) -> String {
    format!("TKT-{:06}-{suffix}", unix_millis % 1_000_000)
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..3)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

/// Whether `s` has the `TKT-dddddd-XXX` shape.
pub fn is_well_formed(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("TKT-") else {
        return false;
    };
    let Some((digits, suffix)) = rest.split_once('-') else {
        return false;
    };
    digits.len() == 6
        && digits.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == 3
        && suffix.bytes().all(|b| BASE36.contains(&b))
}

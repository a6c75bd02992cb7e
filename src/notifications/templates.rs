use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::time::Duration;

use crate::models::Listing;

pub const EXCERPT_CHARS: usize = 100;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A rendered subject and plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Batch-wide template inputs. Everything a message contains comes from
/// here plus the recipient's display name.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub event_name: &'a str,
    pub url: &'a str,
    pub listings: &'a [Listing],
    pub at: DateTime<Utc>,
}

impl TemplateContext<'_> {
    fn count_phrase(&self) -> String {
        let noun = if self.listings.len() == 1 { "listing" } else { "listings" };
        format!("{} new {} {}", self.listings.len(), self.event_name, noun)
    }

    fn timestamp(&self) -> String {
        self.at.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn listing_block(listings: &[Listing]) -> String {
    let mut out = String::new();
    for (i, listing) in listings.iter().enumerate() {
        let _ = writeln!(out, "Listing {}:", i + 1);
        if !listing.price.is_empty() {
            let _ = writeln!(out, "  Price: {}", listing.price);
        }
        if let Some(section) = &listing.section {
            let _ = writeln!(out, "  Section: {}", section);
        }
        let _ = writeln!(out, "  Details: {}", listing.excerpt(EXCERPT_CHARS));
        out.push('\n');
    }
    out
}

fn footer() -> &'static str {
    "---\nYou are receiving this because you subscribed to ticket alerts.\nTo stop them, ask the sender to unsubscribe you.\n"
}

/// Alert sent to every subscriber when new listings appear.
pub fn broadcast(ctx: &TemplateContext<'_>, name: &str) -> RenderedMessage {
    let subject = format!("{} available now", capitalize(&ctx.count_phrase()));

    let mut body = String::new();
    let _ = writeln!(body, "Hi {}!\n", name);
    let _ = writeln!(body, "{} just appeared on the resale page.\n", capitalize(&ctx.count_phrase()));
    let _ = writeln!(body, "Event page: {}\n", ctx.url);
    body.push_str(&listing_block(ctx.listings));
    let _ = writeln!(body, "These listings were not there on the previous check. Act fast, they tend to go quickly.\n");
    let _ = writeln!(body, "Detected at: {}\n", ctx.timestamp());
    body.push_str(footer());

    RenderedMessage { subject, body }
}

/// Early alert for the admin, sent `delay` ahead of the broadcast.
pub fn first_dibs(ctx: &TemplateContext<'_>, delay: Duration) -> RenderedMessage {
    let subject = format!("[First dibs] {}", capitalize(&ctx.count_phrase()));

    let mut body = String::new();
    let _ = writeln!(body, "Hi admin!\n");
    let _ = writeln!(body, "{} just appeared on the resale page.", capitalize(&ctx.count_phrase()));
    let _ = writeln!(
        body,
        "Subscribers will be told in {}.\n",
        describe_delay(delay)
    );
    let _ = writeln!(body, "Event page: {}\n", ctx.url);
    body.push_str(&listing_block(ctx.listings));
    let _ = writeln!(body, "Detected at: {}", ctx.timestamp());

    RenderedMessage { subject, body }
}

/// Welcome for a subscriber who joins while listings are already up.
pub fn welcome_with_listings(ctx: &TemplateContext<'_>, name: &str) -> RenderedMessage {
    let noun = if ctx.listings.len() == 1 { "listing" } else { "listings" };
    let subject = format!("Welcome! {} {} {} available now", ctx.listings.len(), ctx.event_name, noun);

    let mut body = String::new();
    let _ = writeln!(body, "Hi {}!\n", name);
    let _ = writeln!(
        body,
        "Thanks for subscribing to {} ticket alerts. Good timing: {} {} are up right now.\n",
        ctx.event_name,
        ctx.listings.len(),
        noun
    );
    let _ = writeln!(body, "Event page: {}\n", ctx.url);
    body.push_str(&listing_block(ctx.listings));
    let _ = writeln!(body, "From now on you will get an email whenever new listings appear.\n");
    let _ = writeln!(body, "Checked at: {}\n", ctx.timestamp());
    body.push_str(footer());

    RenderedMessage { subject, body }
}

/// Plain subscription confirmation.
pub fn welcome(event_name: &str, url: &str, name: &str, at: DateTime<Utc>) -> RenderedMessage {
    let subject = format!("You're subscribed to {} ticket alerts", event_name);

    let mut body = String::new();
    let _ = writeln!(body, "Hi {}!\n", name);
    let _ = writeln!(
        body,
        "Thanks for subscribing to {} ticket alerts. Nothing is listed right now, but you will get an email as soon as new listings appear.\n",
        event_name
    );
    let _ = writeln!(body, "Event page: {}\n", url);
    let _ = writeln!(body, "Subscribed at: {}\n", at.format(TIMESTAMP_FORMAT));
    body.push_str(footer());

    RenderedMessage { subject, body }
}

/// Subscription confirmation when the page could not be read, so nothing is
/// claimed about what is listed.
pub fn welcome_unverified(event_name: &str, url: &str, name: &str, at: DateTime<Utc>) -> RenderedMessage {
    let subject = format!("You're subscribed to {} ticket alerts", event_name);

    let mut body = String::new();
    let _ = writeln!(body, "Hi {}!\n", name);
    let _ = writeln!(
        body,
        "Thanks for subscribing to {} ticket alerts. You will get an email as soon as new listings appear.\n",
        event_name
    );
    let _ = writeln!(body, "To see what is listed right now, visit the event page: {}\n", url);
    let _ = writeln!(body, "Subscribed at: {}\n", at.format(TIMESTAMP_FORMAT));
    body.push_str(footer());

    RenderedMessage { subject, body }
}

fn describe_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    match (secs / 60, secs % 60) {
        (0, s) => format!("{} seconds", s),
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{} minutes", m),
        (m, s) => format!("{} minutes {} seconds", m, s),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::agent::Agent;
use crate::domain::client::Client;
use crate::domain::quote::Quote;

pub const CLIENT_NAME: &str = "clientName";
pub const FIRST_NAME: &str = "firstName";
pub const DESTINATION: &str = "destination";
pub const TOTAL: &str = "total";
pub const PER_PERSON: &str = "perPerson";
pub const TRIP_NAME: &str = "tripName";
pub const START_DATE: &str = "startDate";
pub const END_DATE: &str = "endDate";
pub const AGENT_NAME: &str = "agentName";
pub const QUOTE_URL: &str = "quoteUrl";

/// The full variable vocabulary. Tokens outside this list are never
/// substituted.
pub const VOCABULARY: &[&str] = &[
    CLIENT_NAME,
    FIRST_NAME,
    DESTINATION,
    TOTAL,
    PER_PERSON,
    TRIP_NAME,
    START_DATE,
    END_DATE,
    AGENT_NAME,
    QUOTE_URL,
];

pub type TemplateVars = BTreeMap<&'static str, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    pub id: &'static str,
    pub subject: &'static str,
    pub body: &'static str,
}

pub const MESSAGE_TEMPLATES: &[MessageTemplate] = &[
    MessageTemplate {
        id: "formal",
        subject: "Your travel quote for {{destination}}",
        body: "Dear {{clientName}},\n\nThank you for planning your trip with us. Your personalized quote for {{tripName}} is ready.\n\nDestination: {{destination}}\nDates: {{startDate}} to {{endDate}}\nTotal: {{total}} ({{perPerson}} per person)\n\nYou can review and respond to the quote here: {{quoteUrl}}\n\nKind regards,\n{{agentName}}",
    },
    MessageTemplate {
        id: "friendly",
        subject: "{{firstName}}, your {{destination}} trip is ready to book!",
        body: "Hi {{firstName}},\n\nGreat news! I've put together your quote for {{tripName}}. The total comes to {{total}}, which works out to {{perPerson}} per person.\n\nTake a look when you get a chance: {{quoteUrl}}\n\nTalk soon,\n{{agentName}}",
    },
    MessageTemplate {
        id: "reminder",
        subject: "Reminder: your quote for {{destination}}",
        body: "Hi {{firstName}},\n\nJust a quick reminder that your quote for {{tripName}} is still waiting for you. It covers {{startDate}} to {{endDate}} at {{total}} total.\n\nReview it here: {{quoteUrl}}\n\nBest,\n{{agentName}}",
    },
];

pub fn find_template(id: &str) -> Option<&'static MessageTemplate> {
    MESSAGE_TEMPLATES.iter().find(|template| template.id.eq_ignore_ascii_case(id.trim()))
}

/// Substitutes `{{variable}}` tokens in `body`.
///
/// Recognized tokens with no supplied value become the empty string so a
/// partially populated quote never blocks delivery. Unrecognized tokens
/// are left untouched, braces and all.
pub fn interpolate(body: &str, vars: &TemplateVars) -> String {
    let mut output = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after = &rest[open + 2..];

        match after.find("}}") {
            Some(close) => {
                let token = after[..close].trim();
                if VOCABULARY.contains(&token) {
                    if let Some(value) = vars.get(token) {
                        output.push_str(value);
                    }
                } else {
                    output.push_str(&rest[open..open + close + 4]);
                }
                rest = &after[close + 2..];
            }
            None => {
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// Everything the variable derivation step needs. `client` and `agent`
/// are optional; missing records simply leave their variables unset and
/// the lenient interpolation turns them into empty strings.
pub struct QuoteContext<'a> {
    pub quote: &'a Quote,
    pub client: Option<&'a Client>,
    pub agent: Option<&'a Agent>,
    pub public_base_url: &'a str,
}

/// Derives the variable map for a quote: currency-formatted money, short
/// human dates, per-person price over counted travelers, and the public
/// portal URL composed from the base origin and the view token.
pub fn prepare_variables(context: &QuoteContext<'_>) -> TemplateVars {
    let quote = context.quote;
    let mut vars = TemplateVars::new();

    if let Some(client) = context.client {
        vars.insert(CLIENT_NAME, client.full_name());
        vars.insert(FIRST_NAME, client.first_name.clone());
    }
    if let Some(agent) = context.agent {
        vars.insert(AGENT_NAME, agent.name.clone());
    }

    vars.insert(DESTINATION, quote.destination.clone());
    vars.insert(TRIP_NAME, quote.trip_name.clone());
    vars.insert(TOTAL, format_money(quote.pricing.total, &quote.currency));
    vars.insert(PER_PERSON, format_money(quote.per_person_total(), &quote.currency));
    vars.insert(START_DATE, format_short_date(quote.start_date));
    vars.insert(END_DATE, format_short_date(quote.end_date));
    vars.insert(QUOTE_URL, view_url(context.public_base_url, &quote.view_token));

    vars
}

pub fn format_money(amount: Decimal, currency: &str) -> String {
    format!("{currency} {amount:.2}")
}

pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn view_url(public_base_url: &str, view_token: &str) -> String {
    format!("{}/view/{}", public_base_url.trim_end_matches('/'), view_token)
}

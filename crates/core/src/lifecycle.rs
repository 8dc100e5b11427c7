use chrono::{DateTime, Utc};

use crate::domain::quote::{Quote, QuoteStatus};
use crate::errors::EngineError;

/// Actions available through the client-facing boundary. These arrive as
/// plain status writes; the engine only decides whether a given action is
/// legal from the quote's current status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientAction {
    View,
    Accept,
    Decline,
}

/// Guard evaluated before the pricing validator and the versioned commit
/// on every structural update. Draft quotes pass; anything shared with a
/// client is locked and only duplication can produce an editable copy.
pub fn ensure_editable(quote: &Quote) -> Result<(), EngineError> {
    match quote.status {
        QuoteStatus::Draft => Ok(()),
        QuoteStatus::Sent | QuoteStatus::Viewed => {
            Err(EngineError::QuoteAlreadySent { quote_id: quote.id.0.clone() })
        }
        status => Err(EngineError::QuoteStateInvalid { quote_id: quote.id.0.clone(), status }),
    }
}

/// Pure expiry predicate. Persisting the Expired transition is the job of
/// an external sweep; handlers call this to decide presentation.
pub fn is_expired(quote: &Quote, now: DateTime<Utc>) -> bool {
    quote.expires_at.is_some_and(|expires_at| now > expires_at)
}

/// Resolves a client action against the quote's current status.
///
/// `Ok(Some(next))` means the action performs a status transition,
/// `Ok(None)` means the action is a harmless repeat and nothing changes,
/// `Err` means the action is illegal from this status.
pub fn client_transition(
    action: ClientAction,
    quote: &Quote,
) -> Result<Option<QuoteStatus>, EngineError> {
    let repeat = match action {
        ClientAction::View => !matches!(quote.status, QuoteStatus::Draft),
        ClientAction::Accept => quote.status == QuoteStatus::Accepted,
        ClientAction::Decline => quote.status == QuoteStatus::Declined,
    };

    let target = match action {
        ClientAction::View => QuoteStatus::Viewed,
        ClientAction::Accept => QuoteStatus::Accepted,
        ClientAction::Decline => QuoteStatus::Declined,
    };

    if quote.can_transition_to(target) {
        Ok(Some(target))
    } else if repeat {
        Ok(None)
    } else {
        Err(EngineError::QuoteStateInvalid { quote_id: quote.id.0.clone(), status: quote.status })
    }
}

//! Pass-ticket generation boundary.
//!
//! A pass-ticket is a short-lived, single-use substitute for a password,
//! scoped to one mainframe APPLID. Generation is delegated to the platform
//! credential authority; on deployments without one, the dummy provider is
//! wired in instead. The translation filter treats failures identically
//! regardless of which implementation is behind the trait.

use tracing::debug;

/// Platform rejected the pass-ticket request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not generate PassTicket for user {user_id} and APPLID {applid}")]
pub struct PassTicketError {
    pub user_id: String,
    pub applid: String,
}

/// Generates one-time pass-tickets for a user and application id.
pub trait PassTicketService: Send + Sync {
    fn generate(&self, user_id: &str, applid: &str) -> Result<String, PassTicketError>;
}

/// Deterministic stand-in for deployments without a credential authority.
///
/// Rejects the same sentinel user and APPLID the platform mock rejects, so
/// failure paths stay exercisable end to end.
#[derive(Debug, Default)]
pub struct DummyPassTicketService;

impl DummyPassTicketService {
    /// Prefix of every ticket the dummy issues.
    pub const TICKET_PREFIX: &'static str = "ZOWE_DUMMY_PASS_TICKET";
    /// User id the dummy always rejects.
    pub const UNKNOWN_USER: &'static str = "unknownUser";
    /// APPLID the dummy always rejects.
    pub const UNKNOWN_APPLID: &'static str = "XBADAPPL";
}

impl PassTicketService for DummyPassTicketService {
    fn generate(&self, user_id: &str, applid: &str) -> Result<String, PassTicketError> {
        if user_id.eq_ignore_ascii_case(Self::UNKNOWN_USER)
            || applid.eq_ignore_ascii_case(Self::UNKNOWN_APPLID)
        {
            return Err(PassTicketError {
                user_id: user_id.to_string(),
                applid: applid.to_string(),
            });
        }

        debug!(user_id, applid, "issuing dummy pass-ticket");
        Ok(format!("{}_{}_{}", Self::TICKET_PREFIX, applid, user_id))
    }
}

//! Request handlers in two security tiers: public endpoints under
//! `/api/auth` for bootstrap and login, and protected endpoints behind the
//! bearer-credential middleware for everything else.

pub mod protected;
pub mod public;

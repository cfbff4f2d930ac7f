//! Things that act on behalf of the bank itself rather than a holder: the
//! bank service that owns every account group, its parameters, and the
//! regression harness that keeps it honest.

pub mod bank;
pub mod params;
pub mod regression;

//! API constants

/// Prefix of every explorer route.
pub const API_PREFIX: &str = "/api/v3";

/// Header carrying the id of the user a request acts as. Requests without it run as
/// the guest user.
pub const USER_HEADER: &str = "x-stowage-user";

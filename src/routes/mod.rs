/// Router Module Index
///
/// Splits the API by the gates in front of it. `create_router` layers each group:
/// public routes run bare, authenticated routes behind the token gate, admin and
/// adopter routes behind the token gate plus their role gate.

/// Routes open to anonymous callers.
pub mod public;

/// Routes requiring a valid session token.
pub mod authenticated;

/// Routes requiring a session whose user has the `admin` role.
pub mod admin;

/// Routes requiring a session whose user has the `adopter` role.
pub mod adopter;

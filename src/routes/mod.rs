/// Router Module Index
///
/// Routes are split by who may reach them. Authentication is applied as a
/// layer on the `authenticated` module; role and ownership rules are decided
/// per operation by the guard, never by the router.

/// Routes reachable without credentials. Comment listings still look at an
/// optional identity to decide what a viewer may see.
pub mod public;

/// Routes behind the `AuthUser` middleware.
pub mod authenticated;

/// Routes nested under `/admin`.
pub mod admin;

// Authentication: GitHub OAuth sign-in, JWT access tokens, request extractor.

pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod oauth;

pub use extractor::AuthUser;

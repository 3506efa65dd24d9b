pub mod check_profiles;
pub mod preflight;

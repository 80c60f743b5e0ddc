pub mod dns;
pub mod subdomain;

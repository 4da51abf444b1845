//! Data codecs (§4.7): JSON and a restricted YAML subset, parsing into
//! [`xmd_core::Value`] and stringifying back.

pub mod json;
pub mod yaml;

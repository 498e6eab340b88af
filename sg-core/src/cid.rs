//! Default AMQP container id generation.
//!
//! The original bridge and generator both seed a `sa-<hex>` buffer with
//! `sprintf(cid_buf, "sa-%x", rand() % 1024)` and then, bizarrely, reuse
//! that same fixed buffer for a user-supplied `--cid`/`-i` value via
//! `sprintf(cid_buf, optarg)` — a format-string vulnerability if `optarg`
//! ever contains a `%`. This module only ever produces the random
//! default; user-supplied ids are taken verbatim by the CLI layer and
//! never passed through a format string.

use rand::Rng;

use crate::constants::DEFAULT_CID_PREFIX;

/// Generate a default container id of the form `sa-<8 lowercase hex chars>`.
pub fn default_container_id() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{DEFAULT_CID_PREFIX}{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_container_id_has_expected_shape() {
        let cid = default_container_id();
        assert!(cid.starts_with("sa-"));
        assert_eq!(cid.len(), "sa-".len() + 8);
        assert!(cid["sa-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn successive_ids_are_very_likely_distinct() {
        assert_ne!(default_container_id(), default_container_id());
    }
}

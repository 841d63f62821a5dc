//! Validation gates for caller-supplied strings headed for a remote command
//! argument vector. Unsafe input is rejected outright, never escaped.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
    static ref FREEFORM_REJECT: Regex = Regex::new(r"[;&|$`<>\\]").unwrap();
}

/// Validate an identifier such as an OVS bridge name: non-empty, drawn only
/// from alphanumerics, hyphens and underscores.
pub fn validate_identifier(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::InvalidInput("identifier cannot be empty".to_string()));
    }
    if !IDENTIFIER.is_match(s) {
        return Err(Error::InvalidInput(format!(
            "invalid identifier {s:?}: must contain only alphanumeric characters, hyphens, and underscores"
        )));
    }
    Ok(())
}

/// Validate a free-form specification such as a packet-match expression.
/// Characters that are part of the specification grammar (slashes, commas,
/// parentheses, equals, colons, periods) are allowed; shell metacharacters
/// are not.
pub fn validate_freeform(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::InvalidInput(
            "specification cannot be empty".to_string(),
        ));
    }
    if FREEFORM_REJECT.is_match(s) {
        return Err(Error::InvalidInput(format!(
            "invalid specification {s:?}: contains potentially dangerous characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_conventional_bridge_names() {
        for name in ["br-int", "br-ex", "br0", "ovn_cluster_router", "BR-INT"] {
            assert!(validate_identifier(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn rejects_empty_and_unsafe_identifiers() {
        for name in [
            "",
            "br int",
            "br-int;rm -rf /",
            "br/int",
            "br-int$(reboot)",
            "br`int`",
            "br-int\n",
        ] {
            let err = validate_identifier(name).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "accepted {name:?}");
        }
    }

    #[test]
    fn accepts_flow_grammar_characters() {
        for spec in [
            "in_port=1,icmp",
            "in_port=2,ip,nw_src=192.168.1.10,nw_dst=192.168.1.20",
            "in_port=3,tcp,nw_src=10.0.0.1,tp_dst=80",
            "ct_state=+trk+est,ip,nw_dst=10.96.0.0/16",
            "recirc_id(0),in_port(2)",
        ] {
            assert!(validate_freeform(spec).is_ok(), "rejected {spec}");
        }
    }

    #[test]
    fn any_single_dangerous_character_flips_the_result() {
        let base = "in_port=1,ip,nw_src=10.244.0.5";
        assert!(validate_freeform(base).is_ok());

        for dangerous in [';', '&', '|', '$', '`', '<', '>', '\\'] {
            let spec = format!("{base}{dangerous}");
            let err = validate_freeform(&spec).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_)),
                "accepted {spec:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_freeform() {
        assert!(validate_freeform("").is_err());
    }
}
